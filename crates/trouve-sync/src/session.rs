use crate::cache::PhotoCache;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use trouve_api::{ContainerCache, DriveAuthApi, TokenProvider};
use trouve_core::{TrouveError, TrouveResult};
use trouve_fs::Backend;
use trouve_store::{CredentialStore, StoredCredential};

/// Tokens within this window of expiry are treated as already expired,
/// so a credential cannot go stale mid-operation.
const EXPIRY_WINDOW_SECONDS: i64 = 60;

/// Manages the stored credential for one profile. GitHub PATs never
/// expire; Drive access tokens are refreshed non-interactively through
/// the OAuth token endpoint when they are about to.
pub struct SessionManager<'a> {
    credentials: &'a dyn CredentialStore,
    auth: Option<&'a DriveAuthApi>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub backend: Option<Backend>,
    pub connected_at: Option<String>,
    pub expires_at: Option<String>,
    pub has_ai_key: bool,
}

impl<'a> SessionManager<'a> {
    pub fn new(credentials: &'a dyn CredentialStore, auth: Option<&'a DriveAuthApi>) -> Self {
        Self { credentials, auth }
    }

    pub fn connect(&self, credential: StoredCredential) -> TrouveResult<()> {
        self.credentials.save_credential(&credential)
    }

    pub fn credential(&self) -> TrouveResult<Option<StoredCredential>> {
        self.credentials.load_credential()
    }

    pub fn is_connected(&self) -> TrouveResult<bool> {
        let Some(credential) = self.credentials.load_credential()? else {
            return Ok(false);
        };
        Ok(!is_expired(&credential, Utc::now()))
    }

    pub fn access_token(&self) -> TrouveResult<Option<String>> {
        Ok(self
            .credentials
            .load_credential()?
            .filter(|credential| !is_expired(credential, Utc::now()))
            .map(|credential| credential.access_token))
    }

    pub fn ai_key(&self) -> TrouveResult<Option<String>> {
        Ok(self
            .credentials
            .load_credential()?
            .and_then(|credential| credential.ai_key))
    }

    pub fn status(&self) -> TrouveResult<SessionStatus> {
        let Some(credential) = self.credentials.load_credential()? else {
            return Ok(SessionStatus {
                connected: false,
                backend: None,
                connected_at: None,
                expires_at: None,
                has_ai_key: false,
            });
        };

        Ok(SessionStatus {
            connected: !is_expired(&credential, Utc::now()),
            backend: Some(credential.backend),
            connected_at: Some(credential.connected_at),
            expires_at: credential.expires_at,
            has_ai_key: credential.ai_key.is_some(),
        })
    }

    /// Returns true when a usable credential is in place afterwards. A
    /// valid credential passes without any network traffic; an expired
    /// Drive credential is refreshed and re-persisted. Refresh failures
    /// are reported as false, not as errors, so callers decide whether
    /// the operation needed the session at all.
    pub fn refresh_if_needed(&self) -> TrouveResult<bool> {
        let Some(credential) = self.credentials.load_credential()? else {
            return Ok(false);
        };

        if !is_expired(&credential, Utc::now()) {
            return Ok(true);
        }

        let (Some(auth), Some(refresh_token), Some(client_id)) = (
            self.auth,
            credential.refresh_token.as_deref(),
            credential.client_id.as_deref(),
        ) else {
            return Ok(false);
        };

        match auth.refresh(client_id, refresh_token) {
            Ok(grant) => {
                let mut updated = credential;
                updated.access_token = grant.access_token;
                updated.expires_at =
                    Some((Utc::now() + Duration::seconds(grant.expires_in)).to_rfc3339());
                self.credentials.save_credential(&updated)?;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(error = %err.message, "token refresh failed");
                Ok(false)
            }
        }
    }

    /// Best-effort remote revocation, then a full local wipe: the
    /// credential, the cached container id, and both photo cache tiers.
    /// Safe to call again when already disconnected.
    pub fn disconnect(
        &self,
        containers: &dyn ContainerCache,
        cache: &mut PhotoCache<'_>,
    ) -> TrouveResult<()> {
        if let Some(credential) = self.credentials.load_credential()?
            && credential.backend == Backend::Drive
            && let Some(auth) = self.auth
            && let Err(err) = auth.revoke(&credential.access_token)
        {
            tracing::debug!(error = %err.message, "token revocation failed; clearing local state anyway");
        }

        self.credentials.remove_credential()?;
        containers.clear_container_id()?;
        cache.clear()
    }
}

impl TokenProvider for SessionManager<'_> {
    fn bearer_token(&self) -> TrouveResult<String> {
        if !self.refresh_if_needed()? {
            return Err(TrouveError::session(
                "session expired or not connected; run `trouve auth connect` first",
            ));
        }

        let credential = self.credentials.load_credential()?.ok_or_else(|| {
            TrouveError::session("session expired or not connected; run `trouve auth connect` first")
        })?;
        Ok(credential.access_token)
    }
}

fn is_expired(credential: &StoredCredential, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = credential.expires_at.as_deref() else {
        return false;
    };

    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(expiry) => expiry.with_timezone(&Utc) <= now + Duration::seconds(EXPIRY_WINDOW_SECONDS),
        // An unreadable expiry is treated as expired rather than trusted.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use trouve_fs::init_workspace;
    use trouve_store::StateStore;

    fn test_store(temp: &tempfile::TempDir) -> StateStore {
        let result = init_workspace(Some(&temp.path().join("ws")), None).expect("init workspace");
        StateStore::from_workspace(&result.paths).expect("state store")
    }

    fn github_credential() -> StoredCredential {
        StoredCredential {
            backend: Backend::Github,
            access_token: "ghp_test".to_string(),
            refresh_token: None,
            client_id: None,
            expires_at: None,
            connected_at: Utc::now().to_rfc3339(),
            ai_key: None,
        }
    }

    fn expired_drive_credential() -> StoredCredential {
        StoredCredential {
            backend: Backend::Drive,
            access_token: "ya29.stale".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            client_id: Some("client-id.apps".to_string()),
            expires_at: Some((Utc::now() - Duration::minutes(5)).to_rfc3339()),
            connected_at: Utc::now().to_rfc3339(),
            ai_key: None,
        }
    }

    #[test]
    fn github_token_never_refreshes() {
        let server = MockServer::start();
        let token_endpoint = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(500);
        });

        let temp = tempfile::tempdir().expect("tempdir");
        let store = test_store(&temp);
        let profile = store.for_profile("default");
        let auth = DriveAuthApi::new(&server.base_url()).expect("auth api");
        let manager = SessionManager::new(&profile, Some(&auth));

        manager.connect(github_credential()).expect("connect");
        assert!(manager.refresh_if_needed().expect("refresh"));
        assert!(manager.is_connected().expect("connected"));
        assert_eq!(manager.bearer_token().expect("token"), "ghp_test");
        token_endpoint.assert_hits(0);
    }

    #[test]
    fn expired_drive_token_is_refreshed_and_persisted() {
        let server = MockServer::start();
        let token_endpoint = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=refresh_token");
            then.status(200).json_body(json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
            }));
        });

        let temp = tempfile::tempdir().expect("tempdir");
        let store = test_store(&temp);
        let profile = store.for_profile("default");
        let auth = DriveAuthApi::new(&server.base_url()).expect("auth api");
        let manager = SessionManager::new(&profile, Some(&auth));

        manager.connect(expired_drive_credential()).expect("connect");
        assert!(!manager.is_connected().expect("connected"));

        assert_eq!(manager.bearer_token().expect("token"), "ya29.fresh");
        token_endpoint.assert_hits(1);

        let stored = store
            .load_credential("default")
            .expect("load")
            .expect("credential present");
        assert_eq!(stored.access_token, "ya29.fresh");
        assert!(manager.is_connected().expect("connected"));

        // Now valid; a second call needs no further network traffic.
        assert!(manager.refresh_if_needed().expect("refresh"));
        token_endpoint.assert_hits(1);
    }

    #[test]
    fn failed_refresh_surfaces_as_session_error() {
        let server = MockServer::start();
        let token_endpoint = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400)
                .json_body(json!({"error": {"message": "invalid_grant"}}));
        });

        let temp = tempfile::tempdir().expect("tempdir");
        let store = test_store(&temp);
        let profile = store.for_profile("default");
        let auth = DriveAuthApi::new(&server.base_url()).expect("auth api");
        let manager = SessionManager::new(&profile, Some(&auth));

        manager.connect(expired_drive_credential()).expect("connect");
        assert!(!manager.refresh_if_needed().expect("refresh"));

        let error = manager.bearer_token().expect_err("token should fail");
        assert_eq!(error.kind, trouve_core::ErrorKind::Session);

        // The stale credential stays in place for a later reconnect.
        assert!(store.load_credential("default").expect("load").is_some());
        assert!(token_endpoint.hits() >= 1);
    }

    #[test]
    fn disconnect_is_idempotent_and_wipes_local_state() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/revoke");
            then.status(200);
        });

        let temp = tempfile::tempdir().expect("tempdir");
        let init =
            init_workspace(Some(&temp.path().join("ws")), None).expect("init workspace");
        let store = StateStore::from_workspace(&init.paths).expect("state store");
        let profile = store.for_profile("default");
        let auth = DriveAuthApi::new(&server.base_url()).expect("auth api");
        let manager = SessionManager::new(&profile, Some(&auth));
        let mut cache = PhotoCache::new(init.paths.photo_cache_dir.clone(), &profile);

        manager.connect(github_credential()).expect("connect");
        store
            .save_container_id("default", "folder123")
            .expect("save container");

        manager.disconnect(&profile, &mut cache).expect("disconnect");
        assert!(!manager.is_connected().expect("connected"));
        assert!(store.load_container_id("default").expect("load").is_none());

        manager
            .disconnect(&profile, &mut cache)
            .expect("second disconnect");
        assert!(!manager.is_connected().expect("connected"));
    }

    #[test]
    fn unparseable_expiry_counts_as_expired() {
        let mut credential = github_credential();
        credential.expires_at = Some("not a timestamp".to_string());
        assert!(is_expired(&credential, Utc::now()));
    }

    #[test]
    fn expiry_window_treats_nearly_expired_tokens_as_expired() {
        let mut credential = github_credential();
        credential.expires_at = Some((Utc::now() + Duration::seconds(30)).to_rfc3339());
        assert!(is_expired(&credential, Utc::now()));

        credential.expires_at = Some((Utc::now() + Duration::seconds(300)).to_rfc3339());
        assert!(!is_expired(&credential, Utc::now()));
    }
}
