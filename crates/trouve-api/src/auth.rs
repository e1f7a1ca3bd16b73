use crate::http::{network_error, new_client, parse_json_response, parse_no_content_response};
use reqwest::blocking::Client;
use serde::Deserialize;
use trouve_core::TrouveResult;

/// OAuth token endpoint client for the Drive backend. Only the refresh
/// grant is spoken here; the initial consent flow happens out of band
/// and its refresh token is handed to `auth connect`.
pub struct DriveAuthApi {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
}

impl DriveAuthApi {
    pub fn new(base_url: &str) -> TrouveResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: new_client()?,
        })
    }

    pub fn refresh(&self, client_id: &str, refresh_token: &str) -> TrouveResult<TokenGrant> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(&[
                ("client_id", client_id),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .map_err(network_error)?;

        parse_json_response(response)
    }

    pub fn revoke(&self, token: &str) -> TrouveResult<()> {
        let response = self
            .client
            .post(format!("{}/revoke", self.base_url))
            .form(&[("token", token)])
            .send()
            .map_err(network_error)?;

        parse_no_content_response(response)
    }
}
