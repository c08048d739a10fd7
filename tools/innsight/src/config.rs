use crate::errors::ConsoleError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub server: Option<String>,
    pub machine: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub viewer: ViewerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Rows from the top of the content that count as the fetch sentinel.
    pub sentinel_rows: usize,
    /// Rows moved per scroll keypress.
    pub scroll_step: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub budget_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "https://innsight.innatical.com".to_string(),
            },
            session: SessionConfig { token_path: None },
            viewer: ViewerConfig {
                sentinel_rows: 2,
                scroll_step: 1,
            },
            logging: LoggingConfig {
                dir: None,
                budget_bytes: 50 * 1024 * 1024,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialAppConfig {
    server: Option<PartialServerConfig>,
    session: Option<PartialSessionConfig>,
    viewer: Option<PartialViewerConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialServerConfig {
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialSessionConfig {
    token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialViewerConfig {
    sentinel_rows: Option<usize>,
    scroll_step: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLoggingConfig {
    dir: Option<PathBuf>,
    budget_bytes: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, ConsoleError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig =
            toml::from_str(&contents).map_err(|e| ConsoleError::ConfigParse(e.to_string()))?;
        apply_partial(&mut cfg, partial);
    }

    if let Some(server) = &overrides.server {
        cfg.server.base_url = server.clone();
    }

    if cfg.server.base_url.trim().is_empty() {
        return Err(ConsoleError::InvalidConfig(
            "server.base_url must not be empty".to_string(),
        ));
    }
    if cfg.viewer.scroll_step == 0 {
        return Err(ConsoleError::InvalidConfig(
            "viewer.scroll_step must be at least 1".to_string(),
        ));
    }

    Ok(cfg)
}

fn apply_partial(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(server) = partial.server {
        if let Some(base_url) = server.base_url {
            cfg.server.base_url = base_url;
        }
    }
    if let Some(session) = partial.session {
        if session.token_path.is_some() {
            cfg.session.token_path = session.token_path;
        }
    }
    if let Some(viewer) = partial.viewer {
        if let Some(sentinel_rows) = viewer.sentinel_rows {
            cfg.viewer.sentinel_rows = sentinel_rows;
        }
        if let Some(scroll_step) = viewer.scroll_step {
            cfg.viewer.scroll_step = scroll_step;
        }
    }
    if let Some(logging) = partial.logging {
        if logging.dir.is_some() {
            cfg.logging.dir = logging.dir;
        }
        if let Some(budget_bytes) = logging.budget_bytes {
            cfg.logging.budget_bytes = budget_bytes;
        }
    }
}

/// Token lives next to the rest of the per-user state unless overridden.
pub fn resolve_token_path(cfg: &AppConfig, home: Option<&Path>) -> PathBuf {
    if let Some(path) = &cfg.session.token_path {
        return path.clone();
    }
    home.map(|dir| dir.join(".innsight").join("token"))
        .unwrap_or_else(|| PathBuf::from(".innsight/token"))
}

pub fn resolve_log_dir(cfg: &AppConfig, home: Option<&Path>) -> PathBuf {
    if let Some(dir) = &cfg.logging.dir {
        return dir.clone();
    }
    home.map(|dir| dir.join(".innsight").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".innsight/logs"))
}
