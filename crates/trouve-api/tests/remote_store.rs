use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use httpmock::Method::{DELETE, GET, PATCH, POST, PUT};
use httpmock::MockServer;
use serde_json::json;
use std::cell::RefCell;
use trouve_api::{
    ContainerCache, DriveAuthApi, DriveStore, GithubStore, RemoteStore, TokenProvider, Variant,
};
use trouve_core::{ErrorKind, TrouveResult};

struct StaticTokens(&'static str);

impl TokenProvider for StaticTokens {
    fn bearer_token(&self) -> TrouveResult<String> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
struct MemoryContainers(RefCell<Option<String>>);

impl ContainerCache for MemoryContainers {
    fn load_container_id(&self) -> TrouveResult<Option<String>> {
        Ok(self.0.borrow().clone())
    }

    fn save_container_id(&self, id: &str) -> TrouveResult<()> {
        *self.0.borrow_mut() = Some(id.to_string());
        Ok(())
    }

    fn clear_container_id(&self) -> TrouveResult<()> {
        *self.0.borrow_mut() = None;
        Ok(())
    }
}

#[test]
fn github_missing_document_reads_as_none() {
    let server = MockServer::start();
    let contents = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/data/inventory.json");
        then.status(404)
            .json_body(json!({"message": "Not Found"}));
    });

    let tokens = StaticTokens("ghp_test");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    let document = store.read_document("inventory.json").expect("read");
    assert!(document.is_none());
    contents.assert_hits(1);
}

#[test]
fn github_read_decodes_wrapped_base64() {
    let server = MockServer::start();
    // The Contents API wraps base64 at 60 columns; the reader must cope.
    let encoded = BASE64.encode(br#"{"items":[]}"#);
    let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
    let contents = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/data/inventory.json")
            .header("authorization", "token ghp_test");
        then.status(200)
            .json_body(json!({"sha": "abc123", "content": wrapped}));
    });

    let tokens = StaticTokens("ghp_test");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    let document = store
        .read_document("inventory.json")
        .expect("read")
        .expect("document present");
    assert_eq!(document, json!({"items": []}));
    contents.assert_hits(1);
}

#[test]
fn github_write_refetches_sha_before_put() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/data/inventory.json");
        then.status(200)
            .json_body(json!({"sha": "oldsha", "content": ""}));
    });
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path("/repos/jcrigby/trouve-tout/contents/data/inventory.json")
            .json_body_partial(r#"{"sha": "oldsha", "message": "Update inventory.json"}"#);
        then.status(200).json_body(json!({"content": {}}));
    });

    let tokens = StaticTokens("ghp_test");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    store
        .write_document("inventory.json", &json!({"items": []}))
        .expect("write");
    lookup.assert_hits(1);
    put.assert_hits(1);
}

#[test]
fn github_delete_of_missing_binary_is_ok() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/images/5a.jpg");
        then.status(404)
            .json_body(json!({"message": "Not Found"}));
    });

    let tokens = StaticTokens("ghp_test");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    store.delete_binary("images/5a.jpg").expect("delete");
    lookup.assert_hits(1);
}

#[test]
fn github_delete_sends_current_sha() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/images/5a.jpg");
        then.status(200)
            .json_body(json!({"sha": "blobsha", "content": ""}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE)
            .path("/repos/jcrigby/trouve-tout/contents/images/5a.jpg")
            .json_body_partial(r#"{"sha": "blobsha"}"#);
        then.status(200).json_body(json!({"content": null}));
    });

    let tokens = StaticTokens("ghp_test");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    store.delete_binary("images/5a.jpg").expect("delete");
    lookup.assert_hits(1);
    delete.assert_hits(1);
}

#[test]
fn github_unauthorized_maps_to_session_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/repos/jcrigby/trouve-tout/contents/data/inventory.json");
        then.status(401)
            .json_body(json!({"message": "Bad credentials"}));
    });

    let tokens = StaticTokens("ghp_revoked");
    let store =
        GithubStore::new(&server.base_url(), "jcrigby", "trouve-tout", &tokens).expect("store");

    let error = store
        .read_document("inventory.json")
        .expect_err("401 should fail");
    assert_eq!(error.kind, ErrorKind::Session);
    assert!(error.message.contains("Bad credentials"));
    assert!(error.message.contains("[http_status=401]"));
}

#[test]
fn drive_folder_is_created_once_and_cached() {
    let server = MockServer::start();
    let folder_lookup = server.mock(|when, then| {
        when.method(GET).path("/drive/v3/files").query_param(
            "q",
            "name = 'Trouve-Tout' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
        );
        then.status(200).json_body(json!({"files": []}));
    });
    let folder_create = server.mock(|when, then| {
        when.method(POST)
            .path("/drive/v3/files")
            .json_body_partial(r#"{"mimeType": "application/vnd.google-apps.folder"}"#);
        then.status(200)
            .json_body(json!({"id": "folder123", "name": "Trouve-Tout"}));
    });
    let file_lookup = server.mock(|when, then| {
        when.method(GET).path("/drive/v3/files").query_param(
            "q",
            "name = 'inventory.json' and 'folder123' in parents and trashed = false",
        );
        then.status(200).json_body(json!({"files": []}));
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    assert!(store.read_document("inventory.json").expect("read").is_none());
    assert!(store.read_document("inventory.json").expect("read").is_none());

    // One folder round trip even across two document reads.
    folder_lookup.assert_hits(1);
    folder_create.assert_hits(1);
    file_lookup.assert_hits(2);
    assert_eq!(
        containers.load_container_id().expect("load"),
        Some("folder123".to_string())
    );
}

#[test]
fn drive_read_uses_media_download() {
    let server = MockServer::start();
    let file_lookup = server.mock(|when, then| {
        when.method(GET).path("/drive/v3/files").query_param(
            "q",
            "name = 'photosets.json' and 'folder123' in parents and trashed = false",
        );
        then.status(200)
            .json_body(json!({"files": [{"id": "doc42", "name": "photosets.json"}]}));
    });
    let download = server.mock(|when, then| {
        when.method(GET)
            .path("/drive/v3/files/doc42")
            .query_param("alt", "media")
            .header("authorization", "Bearer ya29.access");
        then.status(200).body(r#"{"5a": {"status": "KEEP"}}"#);
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    containers.save_container_id("folder123").expect("seed");
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    let document = store
        .read_document("photosets.json")
        .expect("read")
        .expect("document present");
    assert_eq!(document, json!({"5a": {"status": "KEEP"}}));
    file_lookup.assert_hits(1);
    download.assert_hits(1);
}

#[test]
fn drive_existing_document_is_patched_in_place() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/drive/v3/files");
        then.status(200)
            .json_body(json!({"files": [{"id": "doc42", "name": "inventory.json"}]}));
    });
    let patch = server.mock(|when, then| {
        when.method(PATCH)
            .path("/upload/drive/v3/files/doc42")
            .query_param("uploadType", "media");
        then.status(200).json_body(json!({"id": "doc42"}));
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    containers.save_container_id("folder123").expect("seed");
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    store
        .write_document("inventory.json", &json!({"items": []}))
        .expect("write");
    patch.assert_hits(1);
}

#[test]
fn drive_binary_upload_returns_file_id() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/drive/v3/files")
            .query_param("uploadType", "multipart");
        then.status(200)
            .json_body(json!({"id": "photo99", "name": "5a.jpg"}));
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    containers.save_container_id("folder123").expect("seed");
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    let remote_id = store
        .upload_binary(&[0xFF, 0xD8, 0xFF], "5a.jpg")
        .expect("upload");
    assert_eq!(remote_id, "photo99");
    upload.assert_hits(1);
}

#[test]
fn drive_delete_of_missing_binary_is_ok() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/drive/v3/files/photo99");
        then.status(404)
            .json_body(json!({"error": {"message": "File not found"}}));
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    containers.save_container_id("folder123").expect("seed");
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    store.delete_binary("photo99").expect("delete");
    delete.assert_hits(1);
}

#[test]
fn drive_fetch_binary_downloads_media() {
    let server = MockServer::start();
    let download = server.mock(|when, then| {
        when.method(GET)
            .path("/drive/v3/files/photo99")
            .query_param("alt", "media");
        then.status(200).body(&[0xFF, 0xD8, 0xFF, 0xE0]);
    });

    let tokens = StaticTokens("ya29.access");
    let containers = MemoryContainers::default();
    containers.save_container_id("folder123").expect("seed");
    let store =
        DriveStore::new(&server.base_url(), "Trouve-Tout", &tokens, &containers).expect("store");

    let bytes = store.fetch_binary("photo99", Variant::Full).expect("fetch");
    assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    download.assert_hits(1);
}

#[test]
fn refresh_grant_exchanges_refresh_token() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(POST)
            .path("/token")
            .body_contains("grant_type=refresh_token")
            .body_contains("refresh_token=1%2F%2Frefresh");
        then.status(200).json_body(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "token_type": "Bearer",
        }));
    });

    let api = DriveAuthApi::new(&server.base_url()).expect("auth api");
    let grant = api.refresh("client-id.apps", "1//refresh").expect("refresh");

    assert_eq!(grant.access_token, "ya29.fresh");
    assert_eq!(grant.expires_in, 3599);
    token.assert_hits(1);
}

#[test]
fn rejected_refresh_maps_to_remote_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(400).json_body(json!({
            "error": {"message": "invalid_grant"},
        }));
    });

    let api = DriveAuthApi::new(&server.base_url()).expect("auth api");
    let error = api
        .refresh("client-id.apps", "1//stale")
        .expect_err("stale grant should fail");

    assert_eq!(error.kind, ErrorKind::Remote);
    assert!(error.message.contains("invalid_grant"));
    assert!(error.message.contains("[http_status=400]"));
}
