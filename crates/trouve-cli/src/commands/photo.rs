use crate::{
    GlobalOptions, PhotoCommand, build_remote, confirm, drive_auth, print_json, with_context,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use trouve_core::{ExitCode, TrouveError, TrouveResult};
use trouve_sync::{PhotoCache, SessionManager, SyncEngine};

pub fn cmd_photo(command: PhotoCommand, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());
        let remote = build_remote(&ctx.resolved, &session, &profile)?;
        let mut cache = PhotoCache::new(ctx.paths.photo_cache_dir.clone(), &profile);
        let mut engine = SyncEngine::new(remote.as_ref());
        engine.load()?;

        match command {
            PhotoCommand::List => {
                let photo_sets = &engine.state().photo_sets;

                if globals.json {
                    print_json(&json!({"ok": true, "result": photo_sets}))?;
                } else {
                    for entry in photo_sets {
                        println!(
                            "{:<6} {:<12} {:<16} {}",
                            entry.token(),
                            entry.file,
                            entry.category,
                            entry.drive_id.as_deref().unwrap_or("-")
                        );
                    }
                }
                Ok(ExitCode::Success)
            }
            PhotoCommand::Add {
                files,
                box_number,
                category,
            } => {
                let photos = read_photo_files(&files)?;
                let entries = engine.add_photos(&mut cache, box_number, &category, &photos)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": entries}))?;
                } else {
                    for entry in &entries {
                        println!("uploaded {} as {}", entry.file, entry.token());
                    }
                }
                Ok(ExitCode::Success)
            }
            PhotoCommand::Delete { token } => {
                if !confirm(
                    globals,
                    &format!("delete photo '{token}' and update referencing items?"),
                )? {
                    println!("aborted");
                    return Ok(ExitCode::Success);
                }

                let report = engine.delete_photo(&mut cache, &token)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": report}))?;
                } else {
                    println!("deleted photo '{token}'");
                    for id in &report.deleted_items {
                        println!("removed item '{id}' (no photos left)");
                    }
                    for id in &report.rewritten_items {
                        println!("updated item '{id}'");
                    }
                }
                Ok(ExitCode::Success)
            }
            PhotoCommand::Fetch {
                token,
                variant,
                out,
            } => {
                let remote_id = engine
                    .state()
                    .photo_sets
                    .iter()
                    .find(|entry| entry.token() == token)
                    .and_then(|entry| entry.drive_id.clone())
                    .ok_or_else(|| {
                        TrouveError::usage(format!("photo set '{token}' has no remote binary"))
                    })?;

                let cached = cache.fetch(remote.as_ref(), &remote_id, variant.into())?;
                let path = match out {
                    Some(out) => {
                        fs::copy(&cached, &out).map_err(|err| {
                            TrouveError::io(format!(
                                "failed to copy photo to '{}': {}",
                                out.display(),
                                err
                            ))
                        })?;
                        out
                    }
                    None => cached,
                };

                if globals.json {
                    print_json(
                        &json!({"ok": true, "result": {"path": path.display().to_string()}}),
                    )?;
                } else {
                    println!("{}", path.display());
                }
                Ok(ExitCode::Success)
            }
        }
    })
}

fn read_photo_files(files: &[impl AsRef<Path>]) -> TrouveResult<Vec<Vec<u8>>> {
    if files.is_empty() {
        return Err(TrouveError::usage("no photo files given"));
    }

    let mut photos = Vec::with_capacity(files.len());
    for file in files {
        let file = file.as_ref();
        let bytes = fs::read(file).map_err(|err| {
            TrouveError::io(format!(
                "failed to read photo file '{}': {}",
                file.display(),
                err
            ))
        })?;
        photos.push(bytes);
    }

    Ok(photos)
}
