use crate::{GlobalOptions, ProfileCommand, print_json, workspace_target};
use serde_json::json;
use trouve_core::{ExitCode, TrouveError, TrouveResult};
use trouve_fs::{
    Backend, DEFAULT_DRIVE_SERVER, DEFAULT_GITHUB_SERVER, ProfileConfig, WorkspacePaths,
    init_workspace, list_profiles, load_config, resolve_workspace, run_doctor, save_config,
    set_active_profile, set_profile,
};

pub fn cmd_init(backend: Option<&str>, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    let target = workspace_target(globals)?;
    let result = init_workspace(Some(&target), backend)?;

    if let Some(server) = globals.server.clone() {
        let mut config = load_config(&result.paths)?;
        let active = config.active_profile.clone();
        if let Some(profile) = config.profiles.get_mut(&active) {
            profile.server = server;
        }
        save_config(&result.paths, &config)?;
    }

    if globals.json {
        print_json(&json!({
            "ok": true,
            "result": {
                "workspace": result.paths.root.display().to_string(),
                "created": result
                    .created
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>(),
            }
        }))?;
    } else if result.created.is_empty() {
        println!(
            "workspace already initialized at {}",
            result.paths.root.display()
        );
    } else {
        println!("initialized workspace at {}", result.paths.root.display());
    }

    Ok(ExitCode::Success)
}

pub fn cmd_doctor(globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    let paths = workspace_paths(globals)?;
    let report = run_doctor(
        &paths,
        globals.profile.as_deref(),
        globals.server.as_deref(),
    )?;

    if globals.json {
        print_json(&json!({"ok": true, "result": report}))?;
    } else {
        for check in &report.checks {
            let mark = if check.ok { "ok" } else { "FAIL" };
            println!("{mark:>4}  {}: {}", check.name, check.details);
        }
        println!(
            "workspace {} is {}",
            report.workspace,
            if report.healthy { "healthy" } else { "unhealthy" }
        );
    }

    if report.healthy {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::Io)
    }
}

/// Profile management works on the raw config file so that an incomplete
/// profile can still be listed and repaired.
pub fn cmd_profile(command: ProfileCommand, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    let paths = workspace_paths(globals)?;

    match command {
        ProfileCommand::List => {
            let config = load_config(&paths)?;
            let profiles = list_profiles(&config);

            if globals.json {
                print_json(&json!({"ok": true, "result": profiles}))?;
            } else {
                for profile in &profiles {
                    let marker = if profile.active { "*" } else { " " };
                    println!(
                        "{marker} {}  backend={:?}  server={}",
                        profile.name, profile.backend, profile.server
                    );
                }
            }
            Ok(ExitCode::Success)
        }
        ProfileCommand::Use { name } => {
            let mut config = load_config(&paths)?;
            set_active_profile(&mut config, &name)?;
            save_config(&paths, &config)?;

            if globals.json {
                print_json(&json!({"ok": true, "result": {"active_profile": name}}))?;
            } else {
                println!("switched to profile '{name}'");
            }
            Ok(ExitCode::Success)
        }
        ProfileCommand::Set {
            name,
            backend,
            owner,
            repo,
            folder,
            auth_server,
            chat_server,
            chat_model,
        } => {
            let mut config = load_config(&paths)?;
            let target = name.unwrap_or_else(|| config.active_profile.clone());

            let mut profile = config
                .profiles
                .get(&target)
                .cloned()
                .unwrap_or_else(ProfileConfig::github_default);

            if let Some(backend) = backend.as_deref() {
                profile.backend = parse_backend(backend)?;
                profile.server = match profile.backend {
                    Backend::Github => DEFAULT_GITHUB_SERVER.to_string(),
                    Backend::Drive => DEFAULT_DRIVE_SERVER.to_string(),
                };
            }
            // The global --server override is persisted here, so one flag
            // covers both ad-hoc overrides and profile edits.
            if let Some(server) = globals.server.clone() {
                profile.server = server;
            }
            if owner.is_some() {
                profile.owner = owner;
            }
            if repo.is_some() {
                profile.repo = repo;
            }
            if folder.is_some() {
                profile.folder = folder;
            }
            if auth_server.is_some() {
                profile.auth_server = auth_server;
            }
            if chat_server.is_some() {
                profile.chat_server = chat_server;
            }
            if chat_model.is_some() {
                profile.chat_model = chat_model;
            }

            set_profile(&mut config, &target, profile);
            save_config(&paths, &config)?;

            if globals.json {
                print_json(&json!({"ok": true, "result": {"profile": target}}))?;
            } else {
                println!("updated profile '{target}'");
            }
            Ok(ExitCode::Success)
        }
    }
}

fn workspace_paths(globals: &GlobalOptions) -> TrouveResult<WorkspacePaths> {
    let target = workspace_target(globals)?;
    resolve_workspace(Some(&target))
}

fn parse_backend(raw: &str) -> TrouveResult<Backend> {
    match raw {
        "github" => Ok(Backend::Github),
        "drive" => Ok(Backend::Drive),
        other => Err(TrouveError::usage(format!(
            "unknown backend '{other}'; expected 'github' or 'drive'"
        ))),
    }
}
