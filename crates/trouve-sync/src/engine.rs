use crate::cache::PhotoCache;
use crate::state::{
    AppState, CascadeReport, InventoryItem, PhotoSetEntry, SyncPhase, allocate_view_letters,
    apply_photo_cascade, box_contents, next_item_id, reconcile, search,
};
use serde::Serialize;
use serde_json::Value;
use trouve_api::{RemoteStore, Variant};
use trouve_core::{TrouveError, TrouveResult};

pub const INVENTORY_DOC: &str = "inventory.json";
pub const PHOTOSETS_DOC: &str = "photosets.json";

#[derive(Debug, Clone, Serialize)]
pub struct PullOutcome {
    pub items: usize,
    pub photo_sets: usize,
    pub repairs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub photo_set: String,
    pub category: String,
    pub item: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub item_type: Option<String>,
    pub notes: Option<String>,
}

/// Field updates for `edit_item`; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub item: Option<String>,
    pub category: Option<String>,
    pub photo_set: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub item_type: Option<String>,
    pub notes: Option<String>,
}

/// Drives every mutation of the two remote documents. Documents are
/// loaded wholesale, mutated in memory, and written back wholesale;
/// `photosets.json` always goes first so a failure between the two
/// writes leaves dangling item references (repaired on the next load)
/// rather than references to photos that were never recorded.
pub struct SyncEngine<'a> {
    remote: &'a dyn RemoteStore,
    state: AppState,
}

impl<'a> SyncEngine<'a> {
    pub fn new(remote: &'a dyn RemoteStore) -> Self {
        Self {
            remote,
            state: AppState::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn load(&mut self) -> TrouveResult<PullOutcome> {
        let photo_sets: Vec<PhotoSetEntry> = self.read_collection(PHOTOSETS_DOC)?;
        let mut inventory: Vec<InventoryItem> = self.read_collection(INVENTORY_DOC)?;

        let repairs = reconcile(&mut inventory, &photo_sets);
        for repair in &repairs {
            tracing::warn!("{repair}");
        }

        let outcome = PullOutcome {
            items: inventory.len(),
            photo_sets: photo_sets.len(),
            repairs,
        };

        self.state = AppState {
            inventory,
            photo_sets,
            phase: SyncPhase::Loaded,
        };

        Ok(outcome)
    }

    pub fn save(&mut self) -> TrouveResult<()> {
        if self.state.phase == SyncPhase::Unloaded {
            return Err(TrouveError::usage(
                "nothing loaded to save; run `trouve sync pull` first",
            ));
        }

        self.state.phase = SyncPhase::SaveInFlight;
        match self.write_documents() {
            Ok(()) => {
                self.state.phase = SyncPhase::Loaded;
                Ok(())
            }
            Err(err) => {
                self.state.phase = SyncPhase::DirtyPendingSave;
                Err(err)
            }
        }
    }

    pub fn get_item(&self, id: &str) -> Option<&InventoryItem> {
        self.state.inventory.iter().find(|item| item.id == id)
    }

    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<&InventoryItem> {
        search(&self.state.inventory, query, category)
    }

    pub fn box_contents(&self, box_number: u32) -> Vec<&InventoryItem> {
        box_contents(&self.state.inventory, box_number)
    }

    pub fn add_item(&mut self, draft: ItemDraft) -> TrouveResult<InventoryItem> {
        self.require_loaded()?;
        self.validate_photo_set(&draft.photo_set)?;

        let first_token = draft
            .photo_set
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let id = next_item_id(&self.state.inventory, &first_token);

        let item = InventoryItem {
            id,
            category: draft.category,
            photo_set: draft.photo_set,
            item: draft.item,
            brand: draft.brand,
            model: draft.model,
            item_type: draft.item_type,
            notes: draft.notes,
        };

        let snapshot = self.snapshot();
        self.state.inventory.push(item.clone());
        self.state.phase = SyncPhase::DirtyPendingSave;
        self.commit_or_revert(snapshot)?;
        Ok(item)
    }

    pub fn edit_item(&mut self, id: &str, update: ItemUpdate) -> TrouveResult<InventoryItem> {
        self.require_loaded()?;
        if let Some(photo_set) = update.photo_set.as_deref() {
            self.validate_photo_set(photo_set)?;
        }

        let snapshot = self.snapshot();
        let item = self
            .state
            .inventory
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| TrouveError::usage(format!("item '{id}' not found")))?;

        if let Some(name) = update.item {
            item.item = name;
        }
        if let Some(category) = update.category {
            item.category = category;
        }
        if let Some(photo_set) = update.photo_set {
            item.photo_set = photo_set;
        }
        if update.brand.is_some() {
            item.brand = update.brand;
        }
        if update.model.is_some() {
            item.model = update.model;
        }
        if update.item_type.is_some() {
            item.item_type = update.item_type;
        }
        if update.notes.is_some() {
            item.notes = update.notes;
        }
        let updated = item.clone();

        self.state.phase = SyncPhase::DirtyPendingSave;
        self.commit_or_revert(snapshot)?;
        Ok(updated)
    }

    pub fn delete_item(&mut self, id: &str) -> TrouveResult<()> {
        self.require_loaded()?;
        if self.get_item(id).is_none() {
            return Err(TrouveError::usage(format!("item '{id}' not found")));
        }

        let snapshot = self.snapshot();
        self.state.inventory.retain(|item| item.id != id);
        self.state.phase = SyncPhase::DirtyPendingSave;
        self.commit_or_revert(snapshot)
    }

    /// Uploads a batch of photos for one box, allocating successive view
    /// letters. Already-uploaded binaries are removed again if a later
    /// step fails.
    pub fn add_photos(
        &mut self,
        cache: &mut PhotoCache<'_>,
        box_number: u32,
        category: &str,
        photos: &[Vec<u8>],
    ) -> TrouveResult<Vec<PhotoSetEntry>> {
        self.require_loaded()?;
        if photos.is_empty() {
            return Err(TrouveError::usage("no photo files given"));
        }

        let letters = allocate_view_letters(&self.state.photo_sets, box_number, photos.len())?;
        let snapshot = self.snapshot();
        let mut uploaded: Vec<String> = Vec::with_capacity(photos.len());
        let mut entries = Vec::with_capacity(photos.len());

        for (letter, bytes) in letters.iter().zip(photos) {
            let file = format!("{box_number}{letter}.jpg");
            let remote_id = match self.remote.upload_binary(bytes, &file) {
                Ok(remote_id) => remote_id,
                Err(err) => {
                    self.rollback_uploads(&uploaded);
                    self.restore(snapshot);
                    return Err(err);
                }
            };

            if let Err(err) = cache.insert(&remote_id, Variant::Full, bytes) {
                tracing::warn!(error = %err.message, "failed to seed photo cache after upload");
            }
            uploaded.push(remote_id.clone());

            let entry = PhotoSetEntry {
                file,
                box_number,
                view: letter.to_string(),
                category: category.to_string(),
                drive_id: Some(remote_id),
            };
            entries.push(entry.clone());
            self.state.photo_sets.push(entry);
        }

        self.state.phase = SyncPhase::DirtyPendingSave;
        if let Err(err) = self.save() {
            self.rollback_uploads(&uploaded);
            self.restore(snapshot);
            return Err(err);
        }

        Ok(entries)
    }

    /// Deletes one photo and cascades through the inventory: items whose
    /// only photo it was are deleted, the rest lose the token. The
    /// remote binary goes first; local state is only committed once both
    /// documents are written.
    pub fn delete_photo(
        &mut self,
        cache: &mut PhotoCache<'_>,
        token: &str,
    ) -> TrouveResult<CascadeReport> {
        self.require_loaded()?;
        let entry = self
            .state
            .photo_sets
            .iter()
            .find(|entry| entry.token() == token)
            .cloned()
            .ok_or_else(|| TrouveError::usage(format!("photo set '{token}' not found")))?;

        if let Some(remote_id) = entry.drive_id.as_deref() {
            self.remote.delete_binary(remote_id)?;
            cache.evict(remote_id)?;
        }

        let snapshot = self.snapshot();
        let report = apply_photo_cascade(&mut self.state.inventory, token);
        self.state.photo_sets.retain(|e| e.token() != token);
        self.state.phase = SyncPhase::DirtyPendingSave;

        match self.save() {
            Ok(()) => Ok(report),
            Err(err) => {
                self.restore(snapshot);
                Err(err)
            }
        }
    }

    fn read_collection<T: serde::de::DeserializeOwned>(&self, name: &str) -> TrouveResult<Vec<T>> {
        let Some(value) = self.remote.read_document(name)? else {
            return Ok(Vec::new());
        };

        serde_json::from_value(value)
            .map_err(|err| TrouveError::parse(format!("failed to parse document '{name}': {err}")))
    }

    fn write_documents(&self) -> TrouveResult<()> {
        let photo_sets = serde_json::to_value(&self.state.photo_sets)
            .map_err(|err| TrouveError::parse(format!("failed to encode photo sets: {err}")))?;
        self.remote.write_document(PHOTOSETS_DOC, &photo_sets)?;

        let inventory = serde_json::to_value(&self.state.inventory)
            .map_err(|err| TrouveError::parse(format!("failed to encode inventory: {err}")))?;
        self.remote.write_document(INVENTORY_DOC, &inventory)
    }

    fn validate_photo_set(&self, photo_set: &str) -> TrouveResult<()> {
        let tokens: Vec<&str> = photo_set.split('/').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Err(TrouveError::usage(
                "photo set must name at least one photo token, e.g. '5a' or '5a/5b'",
            ));
        }

        for token in tokens {
            if !self.state.photo_sets.iter().any(|e| e.token() == token) {
                return Err(TrouveError::usage(format!(
                    "photo set token '{token}' does not match any photo; run `trouve photo list`"
                )));
            }
        }

        Ok(())
    }

    fn require_loaded(&self) -> TrouveResult<()> {
        if self.state.phase == SyncPhase::Unloaded {
            return Err(TrouveError::usage(
                "inventory not loaded; run `trouve sync pull` first",
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> (Vec<InventoryItem>, Vec<PhotoSetEntry>) {
        (self.state.inventory.clone(), self.state.photo_sets.clone())
    }

    fn restore(&mut self, snapshot: (Vec<InventoryItem>, Vec<PhotoSetEntry>)) {
        self.state.inventory = snapshot.0;
        self.state.photo_sets = snapshot.1;
        self.state.phase = SyncPhase::Loaded;
    }

    fn commit_or_revert(
        &mut self,
        snapshot: (Vec<InventoryItem>, Vec<PhotoSetEntry>),
    ) -> TrouveResult<()> {
        match self.save() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.restore(snapshot);
                Err(err)
            }
        }
    }

    fn rollback_uploads(&self, uploaded: &[String]) {
        for remote_id in uploaded {
            if let Err(err) = self.remote.delete_binary(remote_id) {
                tracing::warn!(error = %err.message, remote_id, "failed to remove uploaded photo during rollback");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use trouve_api::DocumentHandle;
    use trouve_core::ErrorKind;
    use trouve_fs::init_workspace;
    use trouve_store::StateStore;

    /// In-memory remote store recording write order and able to fail on
    /// demand.
    #[derive(Default)]
    struct MemoryRemote {
        documents: RefCell<HashMap<String, Value>>,
        binaries: RefCell<HashMap<String, Vec<u8>>>,
        writes: RefCell<Vec<String>>,
        deleted_binaries: RefCell<Vec<String>>,
        fail_write_of: RefCell<Option<String>>,
        fail_uploads: RefCell<bool>,
    }

    impl RemoteStore for MemoryRemote {
        fn find_document(&self, name: &str) -> TrouveResult<Option<DocumentHandle>> {
            Ok(self
                .documents
                .borrow()
                .contains_key(name)
                .then(|| DocumentHandle {
                    id: name.to_string(),
                    revision: None,
                }))
        }

        fn read_document(&self, name: &str) -> TrouveResult<Option<Value>> {
            Ok(self.documents.borrow().get(name).cloned())
        }

        fn write_document(&self, name: &str, data: &Value) -> TrouveResult<()> {
            if self.fail_write_of.borrow().as_deref() == Some(name) {
                return Err(TrouveError::remote(format!(
                    "write of '{name}' rejected [http_status=500]"
                )));
            }

            self.writes.borrow_mut().push(name.to_string());
            self.documents
                .borrow_mut()
                .insert(name.to_string(), data.clone());
            Ok(())
        }

        fn upload_binary(&self, bytes: &[u8], filename: &str) -> TrouveResult<String> {
            if *self.fail_uploads.borrow() {
                return Err(TrouveError::remote("upload rejected [http_status=500]"));
            }

            let remote_id = format!("images/{filename}");
            self.binaries
                .borrow_mut()
                .insert(remote_id.clone(), bytes.to_vec());
            Ok(remote_id)
        }

        fn delete_binary(&self, remote_id: &str) -> TrouveResult<()> {
            self.binaries.borrow_mut().remove(remote_id);
            self.deleted_binaries
                .borrow_mut()
                .push(remote_id.to_string());
            Ok(())
        }

        fn fetch_binary(&self, remote_id: &str, _variant: Variant) -> TrouveResult<Vec<u8>> {
            self.binaries
                .borrow()
                .get(remote_id)
                .cloned()
                .ok_or_else(|| TrouveError::remote(format!("binary '{remote_id}' not found")))
        }
    }

    fn workspace_cache(temp: &tempfile::TempDir) -> (StateStore, std::path::PathBuf) {
        let init = init_workspace(Some(&temp.path().join("ws")), None).expect("init workspace");
        let store = StateStore::from_workspace(&init.paths).expect("state store");
        (store, init.paths.photo_cache_dir)
    }

    fn seed_documents(remote: &MemoryRemote) {
        remote.documents.borrow_mut().insert(
            PHOTOSETS_DOC.to_string(),
            json!([
                {"file": "3a.jpg", "box": 3, "view": "a", "category": "tools", "driveId": "images/3a.jpg"},
                {"file": "3b.jpg", "box": 3, "view": "b", "category": "tools", "driveId": "images/3b.jpg"},
            ]),
        );
        remote.documents.borrow_mut().insert(
            INVENTORY_DOC.to_string(),
            json!([
                {"id": "3a1", "category": "tools", "photoSet": "3a", "item": "Drill"},
                {"id": "3a2", "category": "tools", "photoSet": "3a/3b", "item": "Saw"},
                {"id": "3b1", "category": "tools", "photoSet": "3b", "item": "Clamp"},
            ]),
        );
        remote
            .binaries
            .borrow_mut()
            .insert("images/3a.jpg".to_string(), vec![1]);
        remote
            .binaries
            .borrow_mut()
            .insert("images/3b.jpg".to_string(), vec![2]);
    }

    #[test]
    fn missing_documents_load_as_empty_state() {
        let remote = MemoryRemote::default();
        let mut engine = SyncEngine::new(&remote);

        let outcome = engine.load().expect("load");
        assert_eq!(outcome.items, 0);
        assert_eq!(outcome.photo_sets, 0);
        assert!(outcome.repairs.is_empty());
        assert_eq!(engine.state().phase, SyncPhase::Loaded);
    }

    #[test]
    fn save_before_load_is_a_usage_error() {
        let remote = MemoryRemote::default();
        let mut engine = SyncEngine::new(&remote);

        let error = engine.save().expect_err("save should fail");
        assert_eq!(error.kind, ErrorKind::Usage);
    }

    #[test]
    fn save_writes_photo_sets_before_inventory() {
        let remote = MemoryRemote::default();
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");
        engine.save().expect("save");

        assert_eq!(
            *remote.writes.borrow(),
            vec![PHOTOSETS_DOC.to_string(), INVENTORY_DOC.to_string()]
        );
    }

    #[test]
    fn written_documents_replace_wholesale_and_keep_order() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");
        engine.save().expect("save");

        let mut second = SyncEngine::new(&remote);
        let outcome = second.load().expect("reload");
        assert_eq!(outcome.items, 3);
        let ids: Vec<&str> = second
            .state()
            .inventory
            .iter()
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(ids, vec!["3a1", "3a2", "3b1"]);
    }

    #[test]
    fn load_reconciles_dangling_references() {
        let remote = MemoryRemote::default();
        remote.documents.borrow_mut().insert(
            PHOTOSETS_DOC.to_string(),
            json!([
                {"file": "5a.jpg", "box": 5, "view": "a", "category": "tools"},
            ]),
        );
        remote.documents.borrow_mut().insert(
            INVENTORY_DOC.to_string(),
            json!([
                {"id": "5a1", "category": "tools", "photoSet": "5a/5b", "item": "Hammer"},
                {"id": "6a1", "category": "tools", "photoSet": "6a", "item": "Ghost"},
            ]),
        );

        let mut engine = SyncEngine::new(&remote);
        let outcome = engine.load().expect("load");

        assert_eq!(outcome.items, 1);
        assert_eq!(outcome.repairs.len(), 2);
        assert_eq!(engine.state().inventory[0].photo_set, "5a");
    }

    #[test]
    fn add_item_allocates_next_id_and_saves() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let added = engine
            .add_item(ItemDraft {
                photo_set: "3a".to_string(),
                category: "tools".to_string(),
                item: "Chisel".to_string(),
                brand: Some("Narex".to_string()),
                model: None,
                item_type: None,
                notes: None,
            })
            .expect("add item");

        assert_eq!(added.id, "3a3");
        assert_eq!(engine.state().phase, SyncPhase::Loaded);

        let stored = remote.documents.borrow();
        let inventory = stored.get(INVENTORY_DOC).expect("inventory written");
        assert_eq!(inventory.as_array().expect("array").len(), 4);
    }

    #[test]
    fn add_item_rejects_unknown_photo_tokens() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let error = engine
            .add_item(ItemDraft {
                photo_set: "9z".to_string(),
                category: "tools".to_string(),
                item: "Nothing".to_string(),
                brand: None,
                model: None,
                item_type: None,
                notes: None,
            })
            .expect_err("unknown token should fail");
        assert_eq!(error.kind, ErrorKind::Usage);
        assert_eq!(engine.state().inventory.len(), 3);
    }

    #[test]
    fn failed_save_reverts_the_optimistic_mutation() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        *remote.fail_write_of.borrow_mut() = Some(INVENTORY_DOC.to_string());
        let error = engine
            .add_item(ItemDraft {
                photo_set: "3a".to_string(),
                category: "tools".to_string(),
                item: "Chisel".to_string(),
                brand: None,
                model: None,
                item_type: None,
                notes: None,
            })
            .expect_err("save should fail");

        assert_eq!(error.kind, ErrorKind::Remote);
        assert_eq!(engine.state().inventory.len(), 3);
        assert_eq!(engine.state().phase, SyncPhase::Loaded);
    }

    #[test]
    fn edit_item_updates_fields_in_place() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let updated = engine
            .edit_item(
                "3a1",
                ItemUpdate {
                    brand: Some("Makita".to_string()),
                    notes: Some("18V".to_string()),
                    ..ItemUpdate::default()
                },
            )
            .expect("edit item");

        assert_eq!(updated.brand.as_deref(), Some("Makita"));
        assert_eq!(updated.item, "Drill");
        assert_eq!(
            engine.get_item("3a1").expect("item").notes.as_deref(),
            Some("18V")
        );
    }

    #[test]
    fn delete_item_removes_and_saves() {
        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        engine.delete_item("3b1").expect("delete item");
        assert!(engine.get_item("3b1").is_none());

        let stored = remote.documents.borrow();
        let inventory = stored.get(INVENTORY_DOC).expect("inventory written");
        assert_eq!(inventory.as_array().expect("array").len(), 2);
    }

    #[test]
    fn add_photos_allocates_letters_and_uploads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (store, dir) = workspace_cache(&temp);
        let profile = store.for_profile("default");
        let mut cache = PhotoCache::new(dir, &profile);

        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let entries = engine
            .add_photos(&mut cache, 3, "tools", &[vec![10], vec![11]])
            .expect("add photos");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, "3c.jpg");
        assert_eq!(entries[1].file, "3d.jpg");
        assert_eq!(entries[0].drive_id.as_deref(), Some("images/3c.jpg"));
        assert!(remote.binaries.borrow().contains_key("images/3c.jpg"));
        assert!(remote.binaries.borrow().contains_key("images/3d.jpg"));
        assert_eq!(engine.state().photo_sets.len(), 4);
    }

    #[test]
    fn failed_photo_save_rolls_back_uploads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (store, dir) = workspace_cache(&temp);
        let profile = store.for_profile("default");
        let mut cache = PhotoCache::new(dir, &profile);

        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        *remote.fail_write_of.borrow_mut() = Some(PHOTOSETS_DOC.to_string());
        let error = engine
            .add_photos(&mut cache, 3, "tools", &[vec![10]])
            .expect_err("save should fail");

        assert_eq!(error.kind, ErrorKind::Remote);
        assert_eq!(engine.state().photo_sets.len(), 2);
        assert!(!remote.binaries.borrow().contains_key("images/3c.jpg"));
        assert!(
            remote
                .deleted_binaries
                .borrow()
                .contains(&"images/3c.jpg".to_string())
        );
    }

    #[test]
    fn delete_photo_cascades_through_the_inventory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (store, dir) = workspace_cache(&temp);
        let profile = store.for_profile("default");
        let mut cache = PhotoCache::new(dir, &profile);

        let remote = MemoryRemote::default();
        seed_documents(&remote);
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let report = engine.delete_photo(&mut cache, "3a").expect("delete photo");

        assert_eq!(report.deleted_items, vec!["3a1".to_string()]);
        assert_eq!(report.rewritten_items, vec!["3a2".to_string()]);
        assert!(
            remote
                .deleted_binaries
                .borrow()
                .contains(&"images/3a.jpg".to_string())
        );

        assert_eq!(engine.state().photo_sets.len(), 1);
        assert_eq!(engine.get_item("3a2").expect("item").photo_set, "3b");

        let stored = remote.documents.borrow();
        let inventory = stored.get(INVENTORY_DOC).expect("inventory written");
        assert_eq!(inventory.as_array().expect("array").len(), 2);
    }

    #[test]
    fn end_to_end_photo_and_item_lifecycle() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (store, dir) = workspace_cache(&temp);
        let profile = store.for_profile("default");
        let mut cache = PhotoCache::new(dir, &profile);

        let remote = MemoryRemote::default();
        let mut engine = SyncEngine::new(&remote);
        engine.load().expect("load");

        let entries = engine
            .add_photos(&mut cache, 5, "tools", &[vec![0xFF, 0xD8]])
            .expect("add photo");
        assert_eq!(entries[0].file, "5a.jpg");

        let added = engine
            .add_item(ItemDraft {
                photo_set: "5a".to_string(),
                category: "tools".to_string(),
                item: "Hammer".to_string(),
                brand: None,
                model: None,
                item_type: None,
                notes: None,
            })
            .expect("add item");
        assert_eq!(added.id, "5a1");

        let found = engine.search("hamm", None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "5a1");

        let report = engine.delete_photo(&mut cache, "5a").expect("delete photo");
        assert_eq!(report.deleted_items, vec!["5a1".to_string()]);
        assert!(engine.state().inventory.is_empty());
        assert!(engine.state().photo_sets.is_empty());

        let mut verify = SyncEngine::new(&remote);
        let outcome = verify.load().expect("reload");
        assert_eq!(outcome.items, 0);
        assert_eq!(outcome.photo_sets, 0);
    }
}
