use crate::http::{network_error, new_client, parse_json_response, parse_no_content_response};
use crate::{DocumentHandle, RemoteStore, TokenProvider, Variant};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Value, json};
use trouve_core::{TrouveError, TrouveResult};

const DOCUMENT_DIR: &str = "data";
const PHOTO_DIR: &str = "images";

/// GitHub Contents API binding. Documents live under `data/` and photo
/// binaries under `images/` in a single repository; every write and
/// delete of an existing path needs the current blob sha, which is
/// re-fetched immediately beforehand rather than trusted from memory.
pub struct GithubStore<'a> {
    base_url: String,
    owner: String,
    repo: String,
    tokens: &'a dyn TokenProvider,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

impl<'a> GithubStore<'a> {
    pub fn new(
        base_url: &str,
        owner: &str,
        repo: &str,
        tokens: &'a dyn TokenProvider,
    ) -> TrouveResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            tokens,
            client: new_client()?,
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, self.owner, self.repo, path
        )
    }

    fn auth_header(&self) -> TrouveResult<String> {
        let token = self.tokens.bearer_token()?;
        Ok(format!("token {token}"))
    }

    fn get_contents(&self, path: &str) -> TrouveResult<Option<ContentsFile>> {
        let response = self
            .client
            .get(self.contents_url(path))
            .header(AUTHORIZATION, self.auth_header()?)
            .send()
            .map_err(network_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        parse_json_response(response).map(Some)
    }

    fn put_contents(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> TrouveResult<()> {
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .header(AUTHORIZATION, self.auth_header()?)
            .json(&body)
            .send()
            .map_err(network_error)?;

        parse_no_content_response(response)
    }

    fn decode_content(path: &str, file: &ContentsFile) -> TrouveResult<Vec<u8>> {
        let encoded = file.content.as_deref().ok_or_else(|| {
            TrouveError::remote(format!("contents response for '{path}' carried no content"))
        })?;

        // The Contents API wraps base64 payloads at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact)
            .map_err(|err| TrouveError::parse(format!("failed to decode '{path}': {err}")))
    }
}

impl RemoteStore for GithubStore<'_> {
    fn find_document(&self, name: &str) -> TrouveResult<Option<DocumentHandle>> {
        let path = format!("{DOCUMENT_DIR}/{name}");
        Ok(self.get_contents(&path)?.map(|file| DocumentHandle {
            id: path,
            revision: Some(file.sha),
        }))
    }

    fn read_document(&self, name: &str) -> TrouveResult<Option<Value>> {
        let path = format!("{DOCUMENT_DIR}/{name}");
        let Some(file) = self.get_contents(&path)? else {
            return Ok(None);
        };

        let bytes = Self::decode_content(&path, &file)?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| TrouveError::parse(format!("failed to parse document '{name}': {err}")))
    }

    fn write_document(&self, name: &str, data: &Value) -> TrouveResult<()> {
        let path = format!("{DOCUMENT_DIR}/{name}");
        let sha = self.get_contents(&path)?.map(|file| file.sha);
        let content = serde_json::to_vec_pretty(data)
            .map_err(|err| TrouveError::parse(format!("failed to encode document '{name}': {err}")))?;

        self.put_contents(&path, &content, &format!("Update {name}"), sha.as_deref())
    }

    fn upload_binary(&self, bytes: &[u8], filename: &str) -> TrouveResult<String> {
        let path = format!("{PHOTO_DIR}/{filename}");
        self.put_contents(&path, bytes, &format!("Add photo {filename}"), None)?;
        Ok(path)
    }

    fn delete_binary(&self, remote_id: &str) -> TrouveResult<()> {
        // Already-gone binaries are not an error; the cleanup is idempotent.
        let Some(file) = self.get_contents(remote_id)? else {
            return Ok(());
        };

        let body = json!({
            "message": format!("Delete {remote_id}"),
            "sha": file.sha,
        });

        let response = self
            .client
            .delete(self.contents_url(remote_id))
            .header(AUTHORIZATION, self.auth_header()?)
            .json(&body)
            .send()
            .map_err(network_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        parse_no_content_response(response)
    }

    fn fetch_binary(&self, remote_id: &str, _variant: Variant) -> TrouveResult<Vec<u8>> {
        // The Contents API has no size variants; both fetch the full blob.
        let file = self.get_contents(remote_id)?.ok_or_else(|| {
            TrouveError::remote(format!("photo '{remote_id}' not found in repository"))
        })?;

        Self::decode_content(remote_id, &file)
    }
}
