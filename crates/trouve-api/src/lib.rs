mod auth;
mod chat;
mod drive;
mod github;
mod http;

pub use auth::{DriveAuthApi, TokenGrant};
pub use chat::{ChatAnswer, ChatApi, ChatMessage, DetectedItem};
pub use drive::DriveStore;
pub use github::GithubStore;

use serde_json::Value;
use trouve_core::TrouveResult;

/// Requested fidelity of a photo fetch. Neither backend produces true
/// thumbnails today; both variants fetch the same bytes, but callers key
/// their caches by variant so native variants can be adopted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Thumb,
    Full,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Thumb => "thumb",
            Variant::Full => "full",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub id: String,
    pub revision: Option<String>,
}

/// Supplies a bearer credential for authenticated calls. Implementations
/// are expected to refresh expired credentials before returning, and to
/// fail with a session error when no valid credential can be produced.
pub trait TokenProvider {
    fn bearer_token(&self) -> TrouveResult<String>;
}

/// Persistence for the lazily created remote container identifier, so the
/// folder lookup is not repeated on every operation.
pub trait ContainerCache {
    fn load_container_id(&self) -> TrouveResult<Option<String>>;
    fn save_container_id(&self, id: &str) -> TrouveResult<()>;
    fn clear_container_id(&self) -> TrouveResult<()>;
}

/// The JSON-document backend: two named collections plus binary photo
/// entries, resolved by name within an application-owned container.
/// Writes are wholesale replacements (last writer wins); where the
/// provider demands a revision marker the binding re-fetches it
/// immediately before writing.
pub trait RemoteStore {
    fn find_document(&self, name: &str) -> TrouveResult<Option<DocumentHandle>>;
    fn read_document(&self, name: &str) -> TrouveResult<Option<Value>>;
    fn write_document(&self, name: &str, data: &Value) -> TrouveResult<()>;
    fn upload_binary(&self, bytes: &[u8], filename: &str) -> TrouveResult<String>;
    fn delete_binary(&self, remote_id: &str) -> TrouveResult<()>;
    fn fetch_binary(&self, remote_id: &str, variant: Variant) -> TrouveResult<Vec<u8>>;
}
