use crate::{AuthCommand, GlobalOptions, confirm, drive_auth, print_json, with_context};
use chrono::{Duration, Utc};
use serde_json::json;
use trouve_core::{ExitCode, TrouveError, TrouveResult};
use trouve_fs::Backend;
use trouve_store::StoredCredential;
use trouve_sync::{PhotoCache, SessionManager};

pub fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    with_context(globals, |ctx| {
        let profile = ctx.store.for_profile(&ctx.resolved.name);
        let auth = drive_auth(&ctx.resolved)?;
        let session = SessionManager::new(&profile, auth.as_ref());

        match command {
            AuthCommand::Connect {
                token,
                access_token,
                refresh_token,
                client_id,
                expires_in,
                ai_key,
            } => {
                let credential = build_credential(
                    ctx.resolved.backend,
                    token,
                    access_token,
                    refresh_token,
                    client_id,
                    expires_in,
                    ai_key,
                )?;
                session.connect(credential)?;

                let status = session.status()?;
                if globals.json {
                    print_json(&json!({"ok": true, "result": status}))?;
                } else {
                    println!("connected profile '{}'", ctx.resolved.name);
                }
                Ok(ExitCode::Success)
            }
            AuthCommand::Status => {
                let status = session.status()?;
                if globals.json {
                    print_json(&json!({"ok": true, "result": status}))?;
                } else if status.connected {
                    println!("connected ({:?})", ctx.resolved.backend);
                    if let Some(expires_at) = &status.expires_at {
                        println!("token expires at {expires_at}");
                    }
                    if status.has_ai_key {
                        println!("AI key stored");
                    }
                } else {
                    println!("not connected; run `trouve auth connect`");
                }
                Ok(ExitCode::Success)
            }
            AuthCommand::Refresh => {
                let refreshed = session.refresh_if_needed()?;
                if !refreshed {
                    return Err(TrouveError::session(
                        "could not refresh the session; run `trouve auth connect` again",
                    ));
                }

                if globals.json {
                    print_json(&json!({"ok": true, "result": session.status()?}))?;
                } else {
                    println!("session is valid");
                }
                Ok(ExitCode::Success)
            }
            AuthCommand::Disconnect => {
                if !confirm(globals, "disconnect and wipe the local photo cache?")? {
                    println!("aborted");
                    return Ok(ExitCode::Success);
                }

                let mut cache = PhotoCache::new(ctx.paths.photo_cache_dir.clone(), &profile);
                session.disconnect(&profile, &mut cache)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": {"disconnected": true}}))?;
                } else {
                    println!("disconnected profile '{}'", ctx.resolved.name);
                }
                Ok(ExitCode::Success)
            }
        }
    })
}

fn build_credential(
    backend: Backend,
    token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    client_id: Option<String>,
    expires_in: Option<i64>,
    ai_key: Option<String>,
) -> TrouveResult<StoredCredential> {
    let now = Utc::now();

    match backend {
        Backend::Github => {
            let token = token.ok_or_else(|| {
                TrouveError::usage("github profiles connect with `--token <personal access token>`")
            })?;

            Ok(StoredCredential {
                backend: Backend::Github,
                access_token: token,
                refresh_token: None,
                client_id: None,
                expires_at: None,
                connected_at: now.to_rfc3339(),
                ai_key,
            })
        }
        Backend::Drive => {
            let access_token = access_token.ok_or_else(|| {
                TrouveError::usage(
                    "drive profiles connect with `--access-token`, `--refresh-token` and `--client-id`",
                )
            })?;

            Ok(StoredCredential {
                backend: Backend::Drive,
                access_token,
                refresh_token,
                client_id,
                expires_at: expires_in
                    .map(|seconds| (now + Duration::seconds(seconds)).to_rfc3339()),
                connected_at: now.to_rfc3339(),
                ai_key,
            })
        }
    }
}
