use crate::{GlobalOptions, SyncCommand, build_remote, drive_auth, print_json, with_context};
use serde_json::json;
use trouve_core::{ExitCode, TrouveResult};
use trouve_sync::{INVENTORY_DOC, PHOTOSETS_DOC, SessionManager, SyncEngine};

pub fn cmd_sync(command: SyncCommand, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());
        let remote = build_remote(&ctx.resolved, &session, &profile)?;

        match command {
            SyncCommand::Pull => {
                let mut engine = SyncEngine::new(remote.as_ref());
                let outcome = engine.load()?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": outcome}))?;
                } else {
                    println!(
                        "pulled {} items and {} photo sets",
                        outcome.items, outcome.photo_sets
                    );
                    for repair in &outcome.repairs {
                        println!("repaired: {repair}");
                    }
                }
                Ok(ExitCode::Success)
            }
            SyncCommand::Push => {
                let mut engine = SyncEngine::new(remote.as_ref());
                let outcome = engine.load()?;
                engine.save()?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": outcome}))?;
                } else {
                    println!(
                        "pushed {} items and {} photo sets",
                        outcome.items, outcome.photo_sets
                    );
                }
                Ok(ExitCode::Success)
            }
            SyncCommand::Status => {
                let connected = session.is_connected()?;
                let (inventory, photo_sets) = if connected {
                    (
                        remote.find_document(INVENTORY_DOC)?,
                        remote.find_document(PHOTOSETS_DOC)?,
                    )
                } else {
                    (None, None)
                };

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "connected": connected,
                            "inventory_document": inventory.map(|handle| handle.id),
                            "photosets_document": photo_sets.map(|handle| handle.id),
                        }
                    }))?;
                } else if !connected {
                    println!("not connected; run `trouve auth connect`");
                } else {
                    println!(
                        "inventory document: {}",
                        inventory
                            .map(|handle| handle.id)
                            .unwrap_or_else(|| "missing".to_string())
                    );
                    println!(
                        "photosets document: {}",
                        photo_sets
                            .map(|handle| handle.id)
                            .unwrap_or_else(|| "missing".to_string())
                    );
                }
                Ok(ExitCode::Success)
            }
        }
    })
}
