mod config;
mod doctor;
mod workspace;

pub use config::{
    Backend, DEFAULT_CHAT_MODEL, DEFAULT_CHAT_SERVER, DEFAULT_DRIVE_FOLDER, DEFAULT_DRIVE_SERVER,
    DEFAULT_GITHUB_SERVER, DEFAULT_OAUTH_SERVER, DEFAULT_PROFILE, ProfileConfig, ProfileView,
    ResolvedProfile, WorkspaceConfig, list_profiles, load_config, resolve_profile, save_config,
    set_active_profile, set_profile,
};
pub use doctor::{DoctorCheck, DoctorReport, run_doctor};
pub use workspace::{WorkspaceInitResult, WorkspacePaths, init_workspace, resolve_workspace};
