use crate::{GlobalOptions, build_remote, drive_auth, print_json, with_context};
use serde_json::json;
use std::fs;
use std::path::Path;
use trouve_api::{ChatApi, ChatMessage};
use trouve_core::{ErrorKind, ExitCode, TrouveError, TrouveResult};
use trouve_sync::{ItemDraft, PhotoCache, SessionManager, SyncEngine};

/// Grounds the model in the live inventory and teaches it the follow-up
/// convention that `split_follow_ups` expects.
fn inventory_prompt(inventory_json: &str) -> String {
    format!(
        "You are an assistant for a household tool inventory. The full inventory follows as a \
JSON array; answer questions using only this data. When you need clarification, put each \
follow-up question on its own line prefixed with `? ` after your answer.\n\n{inventory_json}"
    )
}

pub fn cmd_ask(question: &str, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());
        let api_key = require_ai_key(&session)?;

        let remote = build_remote(&ctx.resolved, &session, &profile)?;
        let mut engine = SyncEngine::new(remote.as_ref());
        engine.load()?;

        let inventory_json = serde_json::to_string(&engine.state().inventory)
            .map_err(|err| TrouveError::io(format!("failed to encode inventory: {err}")))?;

        let chat = ChatApi::new(&ctx.resolved.chat_server, &ctx.resolved.chat_model)?;
        let reply = chat.ask(
            &api_key,
            &[
                ChatMessage::system(inventory_prompt(&inventory_json)),
                ChatMessage::user(question),
            ],
        )?;

        if globals.json {
            print_json(&json!({
                "ok": true,
                "result": {
                    "answer": reply.answer,
                    "follow_ups": reply.follow_ups,
                }
            }))?;
        } else {
            println!("{}", reply.answer);
            for follow_up in &reply.follow_ups {
                println!("? {follow_up}");
            }
        }
        Ok(ExitCode::Success)
    })
}

/// Uploads one box photo and asks the model what is in it. Detected items
/// are added to the inventory with `--yes`, otherwise only listed.
pub fn cmd_catalog(
    file: &Path,
    box_number: u32,
    category: &str,
    globals: &GlobalOptions,
) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());
        let api_key = require_ai_key(&session)?;

        let bytes = fs::read(file).map_err(|err| {
            TrouveError::io(format!(
                "failed to read photo file '{}': {}",
                file.display(),
                err
            ))
        })?;

        let remote = build_remote(&ctx.resolved, &session, &profile)?;
        let mut cache = PhotoCache::new(ctx.paths.photo_cache_dir.clone(), &profile);
        let mut engine = SyncEngine::new(remote.as_ref());
        engine.load()?;

        let entries = engine.add_photos(&mut cache, box_number, category, &[bytes.clone()])?;
        let token = entries
            .first()
            .map(|entry| entry.token())
            .ok_or_else(|| TrouveError::io("photo upload produced no photo set entry"))?;

        let chat = ChatApi::new(&ctx.resolved.chat_server, &ctx.resolved.chat_model)?;
        let detected = match chat.detect_items(&api_key, &bytes, Some(category)) {
            Ok(detected) => detected,
            // The photo is already cataloged at this point; an unreadable
            // model reply only costs the suggestions.
            Err(err) if err.kind == ErrorKind::Parse => {
                tracing::warn!(error = %err.message, "could not parse detection reply");
                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {"photo": token, "items": [], "suggestions": []}
                    }))?;
                } else {
                    println!("uploaded photo '{token}'");
                    println!("could not parse item suggestions from the model reply");
                }
                return Ok(ExitCode::Success);
            }
            Err(err) => return Err(err),
        };

        let mut added = Vec::new();
        if globals.yes {
            for suggestion in &detected {
                let item = engine.add_item(ItemDraft {
                    photo_set: token.clone(),
                    category: category.to_string(),
                    item: suggestion.item.clone(),
                    brand: suggestion.brand.clone(),
                    model: None,
                    item_type: suggestion.item_type.clone(),
                    notes: None,
                })?;
                added.push(item);
            }
        }

        if globals.json {
            print_json(&json!({
                "ok": true,
                "result": {
                    "photo": token,
                    "items": added,
                    "suggestions": detected,
                }
            }))?;
        } else {
            println!("uploaded photo '{token}'");
            if globals.yes {
                for item in &added {
                    println!("added item '{}' ({})", item.id, item.item);
                }
            } else {
                for suggestion in &detected {
                    println!(
                        "suggested: {} ({})",
                        suggestion.item,
                        suggestion.brand.as_deref().unwrap_or("Unknown")
                    );
                }
                if !detected.is_empty() {
                    println!("re-run with --yes to add these items");
                }
            }
        }
        Ok(ExitCode::Success)
    })
}

fn require_ai_key(session: &SessionManager<'_>) -> TrouveResult<String> {
    session.ai_key()?.ok_or_else(|| {
        TrouveError::session("no AI key stored; run `trouve auth connect --ai-key <key>`")
    })
}
