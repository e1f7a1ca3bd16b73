use crate::{
    GlobalOptions, ItemCommand, build_remote, confirm, drive_auth, print_json, with_context,
};
use serde_json::json;
use trouve_core::{ExitCode, TrouveError, TrouveResult};
use trouve_sync::{InventoryItem, ItemDraft, ItemUpdate, SessionManager, SyncEngine};

pub fn cmd_item(command: ItemCommand, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());
        let remote = build_remote(&ctx.resolved, &session, &profile)?;
        let mut engine = SyncEngine::new(remote.as_ref());
        engine.load()?;

        match command {
            ItemCommand::List { box_number } => {
                let items: Vec<&InventoryItem> = match box_number {
                    Some(box_number) => engine.box_contents(box_number),
                    None => engine.state().inventory.iter().collect(),
                };

                if globals.json {
                    print_json(&json!({"ok": true, "result": items}))?;
                } else {
                    print_item_lines(&items);
                }
                Ok(ExitCode::Success)
            }
            ItemCommand::Get { id } => {
                let item = engine
                    .get_item(&id)
                    .ok_or_else(|| TrouveError::usage(format!("item '{id}' not found")))?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": item}))?;
                } else {
                    print_item_lines(&[item]);
                    if let Some(notes) = &item.notes {
                        println!("    notes: {notes}");
                    }
                }
                Ok(ExitCode::Success)
            }
            ItemCommand::Add {
                name,
                photo_set,
                category,
                brand,
                model,
                item_type,
                notes,
            } => {
                let item = engine.add_item(ItemDraft {
                    photo_set,
                    category,
                    item: name,
                    brand,
                    model,
                    item_type,
                    notes,
                })?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": item}))?;
                } else {
                    println!("added item '{}' ({})", item.id, item.item);
                }
                Ok(ExitCode::Success)
            }
            ItemCommand::Edit {
                id,
                name,
                photo_set,
                category,
                brand,
                model,
                item_type,
                notes,
            } => {
                let item = engine.edit_item(
                    &id,
                    ItemUpdate {
                        item: name,
                        category,
                        photo_set,
                        brand,
                        model,
                        item_type,
                        notes,
                    },
                )?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": item}))?;
                } else {
                    println!("updated item '{}'", item.id);
                }
                Ok(ExitCode::Success)
            }
            ItemCommand::Delete { id } => {
                if !confirm(globals, &format!("delete item '{id}'?"))? {
                    println!("aborted");
                    return Ok(ExitCode::Success);
                }

                engine.delete_item(&id)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": {"deleted": id}}))?;
                } else {
                    println!("deleted item '{id}'");
                }
                Ok(ExitCode::Success)
            }
            ItemCommand::Search { query, category } => {
                let matches = engine.search(&query, category.as_deref());

                if globals.json {
                    print_json(&json!({"ok": true, "result": matches}))?;
                } else if matches.is_empty() {
                    println!("no items match '{query}'");
                } else {
                    print_item_lines(&matches);
                }
                Ok(ExitCode::Success)
            }
        }
    })
}

fn print_item_lines(items: &[&InventoryItem]) {
    for item in items {
        println!(
            "{:<6} {:<24} {:<14} {:<10} {}",
            item.id,
            item.item,
            item.display_brand(),
            item.photo_set,
            item.category
        );
    }
}
