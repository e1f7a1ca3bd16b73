use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use trouve_core::{TrouveError, TrouveResult};

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

pub(crate) fn new_client() -> TrouveResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
        .user_agent(format!("trouve-cli/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| TrouveError::io(format!("failed to construct http client: {err}")))
}

pub(crate) fn network_error(err: reqwest::Error) -> TrouveError {
    TrouveError::remote(format!("network request failed: {err}"))
}

pub(crate) fn parse_json_response<T: DeserializeOwned>(response: Response) -> TrouveResult<T> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| TrouveError::remote(format!("failed to read response body: {err}")))?;

    if !status.is_success() {
        return Err(parse_error_response(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|err| TrouveError::parse(format!("failed to decode response body: {err}")))
}

pub(crate) fn parse_bytes_response(response: Response) -> TrouveResult<Vec<u8>> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(parse_error_response(status, &body));
    }

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(|err| TrouveError::remote(format!("failed to read response body: {err}")))
}

pub(crate) fn parse_no_content_response(response: Response) -> TrouveResult<()> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(parse_error_response(status, &body));
    }

    Ok(())
}

/// Providers disagree on error envelopes: GitHub uses a top-level
/// `message`, Drive and the chat gateway nest it under `error.message`.
/// Try both before falling back to the raw body. 401/403 map to the
/// session error kind so callers can prompt for reconnection.
pub(crate) fn parse_error_response(status: StatusCode, body: &str) -> TrouveError {
    let detail = extract_error_message(body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "no error detail provided".to_string()
        } else {
            trimmed.to_string()
        }
    });

    let message = format!("{detail} [http_status={}]", status.as_u16());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TrouveError::session(message)
    } else {
        TrouveError::remote(message)
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(nested) = value.get("error")
        && let Some(message) = nested.get("message").and_then(|m| m.as_str())
    {
        return Some(message.to_string());
    }

    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trouve_core::ErrorKind;

    #[test]
    fn github_error_envelope_is_extracted() {
        let error = parse_error_response(
            StatusCode::NOT_FOUND,
            r#"{"message":"Not Found","documentation_url":"https://docs.github.com"}"#,
        );
        assert_eq!(error.kind, ErrorKind::Remote);
        assert_eq!(error.message, "Not Found [http_status=404]");
    }

    #[test]
    fn drive_error_envelope_is_extracted() {
        let error = parse_error_response(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"Rate limit exceeded"}}"#,
        );
        assert_eq!(error.kind, ErrorKind::Session);
        assert_eq!(error.message, "Rate limit exceeded [http_status=403]");
    }

    #[test]
    fn unauthorized_maps_to_session_kind() {
        let error = parse_error_response(StatusCode::UNAUTHORIZED, "");
        assert_eq!(error.kind, ErrorKind::Session);
        assert!(error.message.contains("[http_status=401]"));
    }

    #[test]
    fn non_json_body_is_passed_through() {
        let error = parse_error_response(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(error.kind, ErrorKind::Remote);
        assert_eq!(error.message, "upstream unavailable [http_status=502]");
    }
}
