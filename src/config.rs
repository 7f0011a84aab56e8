use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

use crate::icebreaker::DEFAULT_QUESTIONS;

#[derive(Parser, Debug)]
#[command(name = "moments", about = "Share your moments")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the web server (default)
    Serve,

    /// Maintenance tasks that need the platform's service-role key
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// Confirm a user's e-mail address, creating the user if a password is given
    ConfirmUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rest,
    Memory,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub icebreaker: IcebreakerConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub url: String,
    pub anon_key: String,
    /// Codes accepted by the memory backend's `redeem_invitation`.
    pub invitation_codes: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
    pub max_caption_chars: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IcebreakerConfig {
    pub reset_delay_ms: u64,
    pub questions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: option_env!("MOMENTS_BACKEND_URL")
                .unwrap_or_default()
                .to_string(),
            anon_key: option_env!("MOMENTS_ANON_KEY")
                .unwrap_or_default()
                .to_string(),
            invitation_codes: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "moments_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            max_caption_chars: 200,
        }
    }
}

impl Default for IcebreakerConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 600,
            questions: DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // Environment overrides
        if let Ok(url) = std::env::var("MOMENTS_BACKEND_URL") {
            config.backend.url = url;
        }
        if let Ok(key) = std::env::var("MOMENTS_ANON_KEY") {
            config.backend.anon_key = key;
        }

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.backend.kind == BackendKind::Rest
            && (config.backend.url.is_empty() || config.backend.anon_key.is_empty())
        {
            anyhow::bail!(
                "backend.url and backend.anon_key must be set (config file, MOMENTS_BACKEND_URL / MOMENTS_ANON_KEY), or use backend.kind = \"memory\""
            );
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".moments")
        })
    }

    /// Request bodies may exceed the image limit so oversized images reach
    /// the handler and get a readable error instead of a bare 413.
    pub fn body_limit(&self) -> usize {
        (self.upload.max_bytes as usize).saturating_mul(4)
    }
}
