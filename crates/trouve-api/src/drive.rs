use crate::http::{
    network_error, new_client, parse_bytes_response, parse_json_response, parse_no_content_response,
};
use crate::{ContainerCache, DocumentHandle, RemoteStore, TokenProvider, Variant};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use trouve_core::{TrouveError, TrouveResult};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const MULTIPART_BOUNDARY: &str = "trouve_multipart_boundary";

/// Google Drive v3 binding. All files live in one application folder
/// which is created lazily on first use; its id is persisted through the
/// container cache so later commands skip the lookup. Documents are
/// resolved by name within the folder, binaries by their Drive file id.
pub struct DriveStore<'a> {
    base_url: String,
    folder_name: String,
    tokens: &'a dyn TokenProvider,
    containers: &'a dyn ContainerCache,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

impl<'a> DriveStore<'a> {
    pub fn new(
        base_url: &str,
        folder_name: &str,
        tokens: &'a dyn TokenProvider,
        containers: &'a dyn ContainerCache,
    ) -> TrouveResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            folder_name: folder_name.to_string(),
            tokens,
            containers,
            client: new_client()?,
        })
    }

    fn auth_header(&self) -> TrouveResult<String> {
        let token = self.tokens.bearer_token()?;
        Ok(format!("Bearer {token}"))
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn list_files(&self, query: &str) -> TrouveResult<FileList> {
        let response = self
            .client
            .get(self.files_url())
            .header(AUTHORIZATION, self.auth_header()?)
            .query(&[("q", query), ("fields", "files(id,name)")])
            .send()
            .map_err(network_error)?;

        parse_json_response(response)
    }

    fn ensure_folder(&self) -> TrouveResult<String> {
        if let Some(id) = self.containers.load_container_id()? {
            return Ok(id);
        }

        let query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false",
            escape_query_value(&self.folder_name)
        );
        if let Some(existing) = self.list_files(&query)?.files.into_iter().next() {
            self.containers.save_container_id(&existing.id)?;
            return Ok(existing.id);
        }

        let response = self
            .client
            .post(self.files_url())
            .header(AUTHORIZATION, self.auth_header()?)
            .json(&json!({
                "name": self.folder_name,
                "mimeType": FOLDER_MIME_TYPE,
            }))
            .send()
            .map_err(network_error)?;

        let created: FileRef = parse_json_response(response)?;
        self.containers.save_container_id(&created.id)?;
        Ok(created.id)
    }

    fn find_file(&self, name: &str) -> TrouveResult<Option<FileRef>> {
        let folder = self.ensure_folder()?;
        let query = format!(
            "name = '{}' and '{folder}' in parents and trashed = false",
            escape_query_value(name)
        );
        Ok(self.list_files(&query)?.files.into_iter().next())
    }

    fn download(&self, file_id: &str) -> TrouveResult<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/{file_id}", self.files_url()))
            .header(AUTHORIZATION, self.auth_header()?)
            .query(&[("alt", "media")])
            .send()
            .map_err(network_error)?;

        parse_bytes_response(response)
    }

    fn create_file(&self, name: &str, content_type: &str, content: &[u8]) -> TrouveResult<String> {
        let folder = self.ensure_folder()?;
        let metadata = json!({
            "name": name,
            "parents": [folder],
        });
        let body = multipart_related(&metadata, content_type, content)?;

        let response = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .header(AUTHORIZATION, self.auth_header()?)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .query(&[("uploadType", "multipart")])
            .body(body)
            .send()
            .map_err(network_error)?;

        let created: FileRef = parse_json_response(response)?;
        Ok(created.id)
    }

    fn update_file(&self, file_id: &str, content_type: &str, content: &[u8]) -> TrouveResult<()> {
        let response = self
            .client
            .patch(format!("{}/upload/drive/v3/files/{file_id}", self.base_url))
            .header(AUTHORIZATION, self.auth_header()?)
            .header(CONTENT_TYPE, content_type.to_string())
            .query(&[("uploadType", "media")])
            .body(content.to_vec())
            .send()
            .map_err(network_error)?;

        parse_no_content_response(response)
    }
}

impl RemoteStore for DriveStore<'_> {
    fn find_document(&self, name: &str) -> TrouveResult<Option<DocumentHandle>> {
        Ok(self.find_file(name)?.map(|file| DocumentHandle {
            id: file.id,
            revision: None,
        }))
    }

    fn read_document(&self, name: &str) -> TrouveResult<Option<Value>> {
        let Some(file) = self.find_file(name)? else {
            return Ok(None);
        };

        let bytes = self.download(&file.id)?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| TrouveError::parse(format!("failed to parse document '{name}': {err}")))
    }

    fn write_document(&self, name: &str, data: &Value) -> TrouveResult<()> {
        let content = serde_json::to_vec_pretty(data)
            .map_err(|err| TrouveError::parse(format!("failed to encode document '{name}': {err}")))?;

        match self.find_file(name)? {
            Some(file) => self.update_file(&file.id, "application/json", &content),
            None => self.create_file(name, "application/json", &content).map(|_| ()),
        }
    }

    fn upload_binary(&self, bytes: &[u8], filename: &str) -> TrouveResult<String> {
        self.create_file(filename, "image/jpeg", bytes)
    }

    fn delete_binary(&self, remote_id: &str) -> TrouveResult<()> {
        let response = self
            .client
            .delete(format!("{}/{remote_id}", self.files_url()))
            .header(AUTHORIZATION, self.auth_header()?)
            .send()
            .map_err(network_error)?;

        // Already-gone binaries are not an error; the cleanup is idempotent.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        parse_no_content_response(response)
    }

    fn fetch_binary(&self, remote_id: &str, _variant: Variant) -> TrouveResult<Vec<u8>> {
        // alt=media always returns the original upload; no size variants.
        self.download(remote_id)
    }
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related(
    metadata: &Value,
    content_type: &str,
    content: &[u8],
) -> TrouveResult<Vec<u8>> {
    let metadata_json = serde_json::to_string(metadata)
        .map_err(|err| TrouveError::parse(format!("failed to encode file metadata: {err}")))?;

    let mut body = Vec::with_capacity(content.len() + metadata_json.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata_json}\r\n--{MULTIPART_BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    Ok(body)
}
