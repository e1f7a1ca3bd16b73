use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use trouve_api::{RemoteStore, Variant};
use trouve_core::{TrouveError, TrouveResult};
use trouve_store::PhotoBlobStore;

/// Two-tier photo cache keyed by `(remote_id, variant)`. Tier 1 is a map
/// of files materialized under the workspace cache directory for this
/// run; tier 2 is the sqlite blob table, which survives restarts. Only a
/// miss in both tiers reaches the remote store. The engine is
/// synchronous, so the tier-1 check also serves as in-flight dedup.
pub struct PhotoCache<'a> {
    dir: PathBuf,
    blobs: &'a dyn PhotoBlobStore,
    open: HashMap<String, PathBuf>,
}

impl<'a> PhotoCache<'a> {
    pub fn new(dir: PathBuf, blobs: &'a dyn PhotoBlobStore) -> Self {
        Self {
            dir,
            blobs,
            open: HashMap::new(),
        }
    }

    pub fn fetch(
        &mut self,
        remote: &dyn RemoteStore,
        remote_id: &str,
        variant: Variant,
    ) -> TrouveResult<PathBuf> {
        let key = cache_key(remote_id, variant);

        if let Some(path) = self.open.get(&key)
            && path.is_file()
        {
            return Ok(path.clone());
        }

        if let Some(bytes) = self.blobs.load_photo(&key)? {
            return self.materialize(&key, remote_id, variant, &bytes);
        }

        let bytes = remote.fetch_binary(remote_id, variant)?;
        self.blobs.store_photo(&key, &bytes)?;
        self.materialize(&key, remote_id, variant, &bytes)
    }

    /// Seeds both tiers after an upload, so the photo that was just sent
    /// never has to be fetched back.
    pub fn insert(
        &mut self,
        remote_id: &str,
        variant: Variant,
        bytes: &[u8],
    ) -> TrouveResult<PathBuf> {
        let key = cache_key(remote_id, variant);
        self.blobs.store_photo(&key, bytes)?;
        self.materialize(&key, remote_id, variant, bytes)
    }

    /// Drops every variant of one photo from both tiers.
    pub fn evict(&mut self, remote_id: &str) -> TrouveResult<()> {
        self.blobs
            .remove_photos_with_prefix(&format!("{remote_id}:"))?;

        for variant in [Variant::Thumb, Variant::Full] {
            let key = cache_key(remote_id, variant);
            if let Some(path) = self.open.remove(&key)
                && path.is_file()
            {
                fs::remove_file(&path).map_err(|err| {
                    TrouveError::io(format!(
                        "failed to remove cached photo '{}': {}",
                        path.display(),
                        err
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Empties both tiers, including tier-1 files left behind by earlier
    /// runs.
    pub fn clear(&mut self) -> TrouveResult<()> {
        self.open.clear();
        self.blobs.clear_photos()?;

        if !self.dir.is_dir() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.dir).map_err(|err| {
            TrouveError::io(format!(
                "failed to list photo cache directory '{}': {}",
                self.dir.display(),
                err
            ))
        })?;

        for entry in entries {
            let entry = entry
                .map_err(|err| TrouveError::io(format!("failed to read cache entry: {err}")))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|err| {
                    TrouveError::io(format!(
                        "failed to remove cached photo '{}': {}",
                        path.display(),
                        err
                    ))
                })?;
            }
        }

        Ok(())
    }

    fn materialize(
        &mut self,
        key: &str,
        remote_id: &str,
        variant: Variant,
        bytes: &[u8],
    ) -> TrouveResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            TrouveError::io(format!(
                "failed to create photo cache directory '{}': {}",
                self.dir.display(),
                err
            ))
        })?;

        let path = self.dir.join(file_name(remote_id, variant));
        fs::write(&path, bytes).map_err(|err| {
            TrouveError::io(format!(
                "failed to write cached photo '{}': {}",
                path.display(),
                err
            ))
        })?;

        self.open.insert(key.to_string(), path.clone());
        Ok(path)
    }
}

fn cache_key(remote_id: &str, variant: Variant) -> String {
    format!("{remote_id}:{}", variant.as_str())
}

fn file_name(remote_id: &str, variant: Variant) -> String {
    let mut safe = String::with_capacity(remote_id.len());
    for ch in remote_id.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            safe.push(ch);
        } else {
            safe.push('_');
        }
    }

    format!("{safe}-{}.jpg", variant.as_str())
}
