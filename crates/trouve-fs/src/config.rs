use crate::workspace::WorkspacePaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use trouve_core::{TrouveError, TrouveResult};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_GITHUB_SERVER: &str = "https://api.github.com";
pub const DEFAULT_DRIVE_SERVER: &str = "https://www.googleapis.com";
pub const DEFAULT_OAUTH_SERVER: &str = "https://oauth2.googleapis.com";
pub const DEFAULT_CHAT_SERVER: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "anthropic/claude-3-haiku";
pub const DEFAULT_DRIVE_FOLDER: &str = "Trouve-Tout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Github,
    Drive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: u32,
    pub active_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub backend: Backend,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub active: bool,
    pub backend: Backend,
    pub server: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProfile {
    pub name: String,
    pub backend: Backend,
    pub server: String,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub folder: String,
    pub auth_server: String,
    pub chat_server: String,
    pub chat_model: String,
}

impl ProfileConfig {
    pub fn github_default() -> Self {
        Self {
            backend: Backend::Github,
            server: DEFAULT_GITHUB_SERVER.to_string(),
            owner: None,
            repo: None,
            folder: None,
            auth_server: None,
            chat_server: None,
            chat_model: None,
        }
    }

    pub fn drive_default() -> Self {
        Self {
            backend: Backend::Drive,
            server: DEFAULT_DRIVE_SERVER.to_string(),
            owner: None,
            repo: None,
            folder: Some(DEFAULT_DRIVE_FOLDER.to_string()),
            auth_server: None,
            chat_server: None,
            chat_model: None,
        }
    }
}

impl WorkspaceConfig {
    pub fn with_default_profile(backend: Option<&str>) -> TrouveResult<Self> {
        let profile = match backend {
            None | Some("github") => ProfileConfig::github_default(),
            Some("drive") => ProfileConfig::drive_default(),
            Some(other) => {
                return Err(TrouveError::usage(format!(
                    "unknown backend '{other}'; expected 'github' or 'drive'"
                )));
            }
        };

        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), profile);

        Ok(Self {
            version: CONFIG_VERSION,
            active_profile: DEFAULT_PROFILE.to_string(),
            profiles,
        })
    }

    pub fn ensure_defaults(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }

        if self.profiles.is_empty() {
            self.profiles
                .insert(DEFAULT_PROFILE.to_string(), ProfileConfig::github_default());
        }

        if self.active_profile.is_empty() || !self.profiles.contains_key(&self.active_profile) {
            if let Some(first_profile) = self.profiles.keys().next() {
                self.active_profile = first_profile.clone();
            } else {
                self.active_profile = DEFAULT_PROFILE.to_string();
            }
        }
    }
}

pub fn load_config(paths: &WorkspacePaths) -> TrouveResult<WorkspaceConfig> {
    let contents = fs::read_to_string(&paths.config_path).map_err(|err| {
        TrouveError::io(format!(
            "failed to read workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;

    let mut config: WorkspaceConfig = toml::from_str(&contents).map_err(|err| {
        TrouveError::io(format!(
            "failed to parse workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;
    config.ensure_defaults();
    Ok(config)
}

pub fn save_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> TrouveResult<()> {
    let serialized = toml::to_string_pretty(config)
        .map_err(|err| TrouveError::io(format!("failed to encode config.toml: {err}")))?;

    fs::write(&paths.config_path, serialized).map_err(|err| {
        TrouveError::io(format!(
            "failed to write workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })
}

pub fn list_profiles(config: &WorkspaceConfig) -> Vec<ProfileView> {
    let mut profiles = Vec::with_capacity(config.profiles.len());

    for (name, profile) in &config.profiles {
        profiles.push(ProfileView {
            name: name.clone(),
            active: name == &config.active_profile,
            backend: profile.backend,
            server: profile.server.clone(),
        });
    }

    profiles
}

pub fn set_active_profile(config: &mut WorkspaceConfig, name: &str) -> TrouveResult<()> {
    if !config.profiles.contains_key(name) {
        return Err(TrouveError::usage(format!(
            "profile '{name}' not found in workspace config"
        )));
    }

    config.active_profile = name.to_string();
    Ok(())
}

pub fn set_profile(config: &mut WorkspaceConfig, name: &str, profile: ProfileConfig) {
    config.profiles.insert(name.to_string(), profile);

    if config.active_profile.is_empty() {
        config.active_profile = name.to_string();
    }
}

pub fn resolve_profile(
    config: &WorkspaceConfig,
    profile_override: Option<&str>,
    server_override: Option<&str>,
) -> TrouveResult<ResolvedProfile> {
    let requested_profile = profile_override.unwrap_or(&config.active_profile);
    let profile = config.profiles.get(requested_profile).ok_or_else(|| {
        TrouveError::usage(format!(
            "profile '{requested_profile}' not found in workspace config"
        ))
    })?;

    let server = server_override
        .unwrap_or(profile.server.as_str())
        .trim_end_matches('/')
        .to_string();

    if profile.backend == Backend::Github && (profile.owner.is_none() || profile.repo.is_none()) {
        return Err(TrouveError::usage(format!(
            "profile '{requested_profile}' uses the github backend but is missing owner/repo; run `trouve profile set --owner <owner> --repo <repo>`"
        )));
    }

    Ok(ResolvedProfile {
        name: requested_profile.to_string(),
        backend: profile.backend,
        server,
        owner: profile.owner.clone(),
        repo: profile.repo.clone(),
        folder: profile
            .folder
            .clone()
            .unwrap_or_else(|| DEFAULT_DRIVE_FOLDER.to_string()),
        auth_server: profile
            .auth_server
            .clone()
            .unwrap_or_else(|| DEFAULT_OAUTH_SERVER.to_string()),
        chat_server: profile
            .chat_server
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_SERVER.to_string()),
        chat_model: profile
            .chat_model
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
    })
}
