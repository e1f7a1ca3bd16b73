use chrono::Utc;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trouve_api::ContainerCache;
use trouve_core::{TrouveError, TrouveResult};
use trouve_fs::{Backend, WorkspacePaths};

/// The persisted credential for one profile. GitHub tokens carry no
/// expiry; Drive access tokens do, alongside the refresh token and
/// client id needed to renew them. The optional AI key rides along so
/// `ask` works without a second connect step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub backend: Backend,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub connected_at: String,
    #[serde(default)]
    pub ai_key: Option<String>,
}

pub trait CredentialStore {
    fn load_credential(&self) -> TrouveResult<Option<StoredCredential>>;
    fn save_credential(&self, credential: &StoredCredential) -> TrouveResult<()>;
    fn remove_credential(&self) -> TrouveResult<()>;
}

/// Durable tier of the photo cache. Keys are `{remote_id}:{variant}`;
/// blobs survive across runs and are only dropped on deletion or
/// disconnect.
pub trait PhotoBlobStore {
    fn load_photo(&self, key: &str) -> TrouveResult<Option<Vec<u8>>>;
    fn store_photo(&self, key: &str, bytes: &[u8]) -> TrouveResult<()>;
    fn remove_photos_with_prefix(&self, prefix: &str) -> TrouveResult<()>;
    fn clear_photos(&self) -> TrouveResult<()>;
}

#[derive(Debug, Clone)]
pub struct StateStore {
    db_path: PathBuf,
}

/// Scopes a `StateStore` to one profile so the per-call plumbing can
/// hand out the narrow trait views the session and cache layers expect.
#[derive(Debug, Clone, Copy)]
pub struct ProfileStore<'a> {
    store: &'a StateStore,
    profile: &'a str,
}

impl StateStore {
    pub fn from_workspace(paths: &WorkspacePaths) -> TrouveResult<Self> {
        let store = Self {
            db_path: paths.state_db_path.clone(),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;
        Ok(store)
    }

    pub fn for_profile<'a>(&'a self, profile: &'a str) -> ProfileStore<'a> {
        ProfileStore {
            store: self,
            profile,
        }
    }

    pub fn load_credential(&self, profile: &str) -> TrouveResult<Option<StoredCredential>> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM credentials WHERE profile = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load credential", &self.db_path, err))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let parsed = serde_json::from_str::<StoredCredential>(&payload).map_err(|err| {
            TrouveError::io(format!(
                "failed to parse stored credential in '{}': {}",
                self.db_path.display(),
                err
            ))
        })?;

        Ok(Some(parsed))
    }

    pub fn save_credential(
        &self,
        profile: &str,
        credential: &StoredCredential,
    ) -> TrouveResult<()> {
        let key = profile_key(profile);
        let payload = serde_json::to_string(credential)
            .map_err(|err| TrouveError::io(format!("failed to serialize credential: {err}")))?;

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO credentials (profile, payload_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![key, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save credential", &self.db_path, err))?;

        Ok(())
    }

    pub fn remove_credential(&self, profile: &str) -> TrouveResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute("DELETE FROM credentials WHERE profile = ?1", params![key])
            .map_err(|err| sqlite_error("remove credential", &self.db_path, err))?;
        Ok(())
    }

    pub fn load_container_id(&self, profile: &str) -> TrouveResult<Option<String>> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.query_row(
            "SELECT container_id FROM containers WHERE profile = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| sqlite_error("load container id", &self.db_path, err))
    }

    pub fn save_container_id(&self, profile: &str, container_id: &str) -> TrouveResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO containers (profile, container_id, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(profile) DO UPDATE SET container_id = excluded.container_id, updated_at = excluded.updated_at",
            params![key, container_id, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save container id", &self.db_path, err))?;

        Ok(())
    }

    pub fn remove_container_id(&self, profile: &str) -> TrouveResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute("DELETE FROM containers WHERE profile = ?1", params![key])
            .map_err(|err| sqlite_error("remove container id", &self.db_path, err))?;
        Ok(())
    }

    pub fn load_photo(&self, profile: &str, cache_key: &str) -> TrouveResult<Option<Vec<u8>>> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.query_row(
            "SELECT bytes FROM photo_cache WHERE profile = ?1 AND cache_key = ?2",
            params![key, cache_key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|err| sqlite_error("load cached photo", &self.db_path, err))
    }

    pub fn store_photo(&self, profile: &str, cache_key: &str, bytes: &[u8]) -> TrouveResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO photo_cache (profile, cache_key, bytes, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile, cache_key) DO UPDATE SET bytes = excluded.bytes, updated_at = excluded.updated_at",
            params![key, cache_key, bytes, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("store cached photo", &self.db_path, err))?;

        Ok(())
    }

    pub fn remove_photos_with_prefix(&self, profile: &str, prefix: &str) -> TrouveResult<()> {
        let key = profile_key(profile);
        let pattern = format!("{}%", escape_like(prefix));
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM photo_cache WHERE profile = ?1 AND cache_key LIKE ?2 ESCAPE '\\'",
            params![key, pattern],
        )
        .map_err(|err| sqlite_error("remove cached photos", &self.db_path, err))?;
        Ok(())
    }

    pub fn clear_photos(&self, profile: &str) -> TrouveResult<()> {
        let key = profile_key(profile);
        let conn = self.connection()?;
        conn.execute("DELETE FROM photo_cache WHERE profile = ?1", params![key])
            .map_err(|err| sqlite_error("clear photo cache", &self.db_path, err))?;
        Ok(())
    }

    fn connection(&self) -> TrouveResult<Connection> {
        Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open state database", &self.db_path, err))
    }

    fn initialize_schema(&self, conn: &Connection) -> TrouveResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS credentials (
                 profile TEXT PRIMARY KEY,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS containers (
                 profile TEXT PRIMARY KEY,
                 container_id TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS photo_cache (
                 profile TEXT NOT NULL,
                 cache_key TEXT NOT NULL,
                 bytes BLOB NOT NULL,
                 updated_at TEXT NOT NULL,
                 PRIMARY KEY (profile, cache_key)
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))?;

        Ok(())
    }
}

impl CredentialStore for ProfileStore<'_> {
    fn load_credential(&self) -> TrouveResult<Option<StoredCredential>> {
        self.store.load_credential(self.profile)
    }

    fn save_credential(&self, credential: &StoredCredential) -> TrouveResult<()> {
        self.store.save_credential(self.profile, credential)
    }

    fn remove_credential(&self) -> TrouveResult<()> {
        self.store.remove_credential(self.profile)
    }
}

impl ContainerCache for ProfileStore<'_> {
    fn load_container_id(&self) -> TrouveResult<Option<String>> {
        self.store.load_container_id(self.profile)
    }

    fn save_container_id(&self, id: &str) -> TrouveResult<()> {
        self.store.save_container_id(self.profile, id)
    }

    fn clear_container_id(&self) -> TrouveResult<()> {
        self.store.remove_container_id(self.profile)
    }
}

impl PhotoBlobStore for ProfileStore<'_> {
    fn load_photo(&self, key: &str) -> TrouveResult<Option<Vec<u8>>> {
        self.store.load_photo(self.profile, key)
    }

    fn store_photo(&self, key: &str, bytes: &[u8]) -> TrouveResult<()> {
        self.store.store_photo(self.profile, key, bytes)
    }

    fn remove_photos_with_prefix(&self, prefix: &str) -> TrouveResult<()> {
        self.store.remove_photos_with_prefix(self.profile, prefix)
    }

    fn clear_photos(&self) -> TrouveResult<()> {
        self.store.clear_photos(self.profile)
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> TrouveError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return TrouveError::io(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.trouve/state.db' and reconnect with `trouve auth connect` to rebuild it",
            db_path.display()
        ));
    }

    TrouveError::io(format!(
        "failed to {action} using state database '{}': {}",
        db_path.display(),
        err
    ))
}

fn profile_key(profile: &str) -> String {
    let mut output = String::with_capacity(profile.len());
    for ch in profile.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            output.push(ch);
        } else {
            output.push('_');
        }
    }

    if output.is_empty() {
        "default".to_string()
    } else {
        output
    }
}
