use anyhow::Context;
use serde::Deserialize;

/// Config, read from the TOML file given as the first CLI argument.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the website on
    pub listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    #[serde(default)]
    pub human_logs: bool,

    /// Max HTTP body size the site accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// password to connect to database.
    pub db_dsn: String,

    /// maximum number of connections maintained by PostgresStore
    pub db_pool_size: u32,

    /// maximum seconds waiting for a database connection
    pub db_connection_timeout: u64,

    /// Apply pending SQL migrations before serving.
    #[serde(default = "yes")]
    pub run_migrations: bool,

    /// How many posts to show on each page of the feed, explore page and profiles.
    #[serde(default = "posts_per_page")]
    pub posts_per_page: i64,

    /// Key used to sign session cookies. Changing it logs everybody out.
    pub secret_key: String,

    /// Lifetime of a session that didn't tick "remember me".
    #[serde(default = "session_hours")]
    pub session_hours: i64,

    /// Lifetime of a remembered session.
    #[serde(default = "remember_days")]
    pub remember_days: i64,

    /// Only send the session cookie over HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_file(filepath: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(filepath)
            .with_context(|| format!("couldn't read config file {}", filepath))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents).context("couldn't parse config file")?;
        if config.secret_key.len() < 16 {
            anyhow::bail!("secret_key must be at least 16 bytes long");
        }
        if config.posts_per_page < 1 {
            anyhow::bail!("posts_per_page must be positive");
        }
        Ok(config)
    }
}

fn max_body_size() -> usize {
    65536
}

fn yes() -> bool {
    true
}

fn posts_per_page() -> i64 {
    3
}

fn session_hours() -> i64 {
    24
}

fn remember_days() -> i64 {
    365
}
