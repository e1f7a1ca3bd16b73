mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use trouve_api::{ContainerCache, DriveAuthApi, DriveStore, GithubStore, RemoteStore, Variant};
use trouve_core::{ExitCode, TrouveError, TrouveResult};
use trouve_fs::{
    Backend, ResolvedProfile, WorkspacePaths, load_config, resolve_profile, resolve_workspace,
};
use trouve_store::StateStore;
use trouve_sync::SessionManager;

#[derive(Debug, Parser)]
#[command(
    name = "trouve",
    version,
    about = "Workspace-first tool inventory, synced to GitHub or Google Drive",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true)]
    profile: Option<String>,

    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init {
        #[arg(long)]
        backend: Option<String>,
    },
    Doctor,
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },
    Photo {
        #[command(subcommand)]
        command: PhotoCommand,
    },
    Ask {
        question: String,
    },
    Catalog {
        file: PathBuf,
        #[arg(long = "box")]
        box_number: u32,
        #[arg(long)]
        category: String,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    List,
    Use {
        name: String,
    },
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        backend: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        auth_server: Option<String>,
        #[arg(long)]
        chat_server: Option<String>,
        #[arg(long)]
        chat_model: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    Connect {
        /// GitHub personal access token.
        #[arg(long)]
        token: Option<String>,
        /// Google OAuth access token.
        #[arg(long)]
        access_token: Option<String>,
        #[arg(long)]
        refresh_token: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        /// Access token lifetime in seconds.
        #[arg(long)]
        expires_in: Option<i64>,
        /// API key for the AI collaborator.
        #[arg(long)]
        ai_key: Option<String>,
    },
    Status,
    Refresh,
    Disconnect,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    Pull,
    Push,
    Status,
}

#[derive(Debug, Subcommand)]
enum ItemCommand {
    List {
        #[arg(long = "box")]
        box_number: Option<u32>,
    },
    Get {
        id: String,
    },
    Add {
        name: String,
        #[arg(long)]
        photo_set: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo_set: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        id: String,
    },
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PhotoVariant {
    Thumb,
    Full,
}

impl From<PhotoVariant> for Variant {
    fn from(variant: PhotoVariant) -> Self {
        match variant {
            PhotoVariant::Thumb => Variant::Thumb,
            PhotoVariant::Full => Variant::Full,
        }
    }
}

#[derive(Debug, Subcommand)]
enum PhotoCommand {
    List,
    Add {
        files: Vec<PathBuf>,
        #[arg(long = "box")]
        box_number: u32,
        #[arg(long)]
        category: String,
    },
    Delete {
        token: String,
    },
    Fetch {
        token: String,
        #[arg(long, value_enum, default_value = "full")]
        variant: PhotoVariant,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct GlobalOptions {
    pub(crate) profile: Option<String>,
    pub(crate) workspace: Option<PathBuf>,
    pub(crate) server: Option<String>,
    pub(crate) json: bool,
    pub(crate) yes: bool,
}

/// Resolved workspace, profile and state store shared by every command
/// that touches the inventory.
pub(crate) struct Context {
    pub(crate) paths: WorkspacePaths,
    pub(crate) resolved: ResolvedProfile,
    pub(crate) store: StateStore,
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.debug, cli.json, cli.no_color);

    let globals = GlobalOptions {
        profile: cli.profile,
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
        yes: cli.yes,
    };

    let result = run_command(cli.command, &globals);

    let exit = match result {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

fn configure_logging(debug: bool, json: bool, no_color: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> TrouveResult<ExitCode> {
    match command {
        Command::Init { backend } => commands::profile::cmd_init(backend.as_deref(), globals),
        Command::Doctor => commands::profile::cmd_doctor(globals),
        Command::Profile { command } => commands::profile::cmd_profile(command, globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Sync { command } => commands::sync::cmd_sync(command, globals),
        Command::Item { command } => commands::item::cmd_item(command, globals),
        Command::Photo { command } => commands::photo::cmd_photo(command, globals),
        Command::Ask { question } => commands::ask::cmd_ask(&question, globals),
        Command::Catalog {
            file,
            box_number,
            category,
        } => commands::ask::cmd_catalog(&file, box_number, &category, globals),
    }
}

pub(crate) fn with_context<F>(globals: &GlobalOptions, run: F) -> TrouveResult<ExitCode>
where
    F: FnOnce(Context) -> TrouveResult<ExitCode>,
{
    let target = workspace_target(globals)?;
    let paths = resolve_workspace(Some(&target))?;
    let config = load_config(&paths)?;
    let resolved = resolve_profile(
        &config,
        globals.profile.as_deref(),
        globals.server.as_deref(),
    )?;
    let store = StateStore::from_workspace(&paths)?;

    run(Context {
        paths,
        resolved,
        store,
    })
}

pub(crate) fn build_remote<'a>(
    resolved: &ResolvedProfile,
    session: &'a SessionManager<'a>,
    containers: &'a dyn ContainerCache,
) -> TrouveResult<Box<dyn RemoteStore + 'a>> {
    match resolved.backend {
        Backend::Github => {
            let owner = resolved
                .owner
                .as_deref()
                .ok_or_else(|| TrouveError::usage("github profile is missing an owner"))?;
            let repo = resolved
                .repo
                .as_deref()
                .ok_or_else(|| TrouveError::usage("github profile is missing a repo"))?;
            Ok(Box::new(GithubStore::new(
                &resolved.server,
                owner,
                repo,
                session,
            )?))
        }
        Backend::Drive => Ok(Box::new(DriveStore::new(
            &resolved.server,
            &resolved.folder,
            session,
            containers,
        )?)),
    }
}

pub(crate) fn drive_auth(resolved: &ResolvedProfile) -> TrouveResult<Option<DriveAuthApi>> {
    if resolved.backend == Backend::Drive {
        Ok(Some(DriveAuthApi::new(&resolved.auth_server)?))
    } else {
        Ok(None)
    }
}

pub(crate) fn workspace_target(globals: &GlobalOptions) -> TrouveResult<PathBuf> {
    if let Some(path) = &globals.workspace {
        return absolutize(path);
    }

    std::env::current_dir().map_err(|err| {
        TrouveError::io(format!(
            "failed to resolve current directory for default workspace: {err}"
        ))
    })
}

fn absolutize(path: &Path) -> TrouveResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().map_err(|err| {
        TrouveError::io(format!("failed to resolve current directory for path: {err}"))
    })?;

    Ok(cwd.join(path))
}

/// Destructive commands ask unless `--yes` was given.
pub(crate) fn confirm(globals: &GlobalOptions, prompt: &str) -> TrouveResult<bool> {
    if globals.yes {
        return Ok(true);
    }

    print!("{prompt} [y/N] ");
    std::io::stdout()
        .flush()
        .map_err(|err| TrouveError::io(format!("failed to flush stdout: {err}")))?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|err| TrouveError::io(format!("failed to read confirmation: {err}")))?;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn render_error(error: &TrouveError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": {
                "kind": error.kind,
                "message": &error.message,
            }
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"io\",\"message\":\"failed to serialize error\"}}"
                .to_string()
        });
        eprintln!("{serialized}");
    } else {
        eprintln!("error: {}", error.message);
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> TrouveResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| TrouveError::io(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
