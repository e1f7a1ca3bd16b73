mod cache;
mod engine;
mod session;
mod state;

pub use cache::PhotoCache;
pub use engine::{INVENTORY_DOC, ItemDraft, ItemUpdate, PHOTOSETS_DOC, PullOutcome, SyncEngine};
pub use session::{SessionManager, SessionStatus};
pub use state::{AppState, CascadeReport, InventoryItem, PhotoSetEntry, SyncPhase};
