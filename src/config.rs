use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "agora", about = "A social content server")]
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
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Cache tuning. There is no invalidation on write: each TTL bounds how
/// stale the corresponding listings may get.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub posts_ttl_secs: u64,
    pub users_ttl_secs: u64,
    pub comments_ttl_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub token_hours: u64,
}

/// Admin account seeded at startup. Env vars AGORA_ADMIN_EMAIL,
/// AGORA_ADMIN_USERNAME and AGORA_ADMIN_PASSWORD override the file.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            posts_ttl_secs: 3600,
            users_ttl_secs: 3600,
            comments_ttl_secs: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { token_hours: 24 }
    }
}

impl CacheConfig {
    pub fn posts_ttl(&self) -> Duration {
        Duration::from_secs(self.posts_ttl_secs)
    }

    pub fn users_ttl(&self) -> Duration {
        Duration::from_secs(self.users_ttl_secs)
    }

    pub fn comments_ttl(&self) -> Duration {
        Duration::from_secs(self.comments_ttl_secs)
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_hours * 3600)
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Env overrides for the admin seed
        if let Ok(email) = std::env::var("AGORA_ADMIN_EMAIL") {
            config.admin.email = Some(email);
        }
        if let Ok(username) = std::env::var("AGORA_ADMIN_USERNAME") {
            config.admin.username = Some(username);
        }
        if let Ok(password) = std::env::var("AGORA_ADMIN_PASSWORD") {
            config.admin.password = Some(password);
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("agora.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".agora")
        })
    }

    pub fn db_path(&self) -> &PathBuf {
        self.database.path.as_ref().expect("database path resolved in load()")
    }
}
