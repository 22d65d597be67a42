use serde::Deserialize;
use tokio::sync::OnceCell;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{config_candidates, find_config_file, read_config};

mod error;
pub use error::{ConfigError, ConfigResult};

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    #[serde(default)]
    rate_limit: Option<RateLimit>,
    #[serde(default)]
    uploads: Uploads,
    #[serde(default)]
    events: Events,
    mail: Option<Mail>,
    #[serde(default)]
    oauth: OAuth,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_environment")]
    environment: Environment,
    #[serde(default = "default_access_ttl")]
    access_token_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    refresh_token_ttl_days: i64,
    #[serde(default = "default_frontend_url")]
    frontend_url: String,
    #[serde(default)]
    cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    max_requests: Option<u32>,
    #[serde(default = "default_window_secs")]
    window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Uploads {
    #[serde(default = "default_uploads_dir")]
    dir: String,
    #[serde(default = "default_max_file_size")]
    max_file_size: usize,
    #[serde(default = "default_public_path")]
    public_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Events {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Mail {
    smtp_host: String,
    smtp_username: String,
    smtp_password: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OAuth {
    google: Option<OAuthProvider>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthProvider {
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_access_ttl() -> i64 {
    60 * 24
}

fn default_refresh_ttl() -> i64 {
    7
}

fn default_frontend_url() -> String {
    String::from("http://localhost:3000")
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_uploads_dir() -> String {
    String::from("uploads")
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_public_path() -> String {
    String::from("/api/static")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

impl Default for Uploads {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            max_file_size: default_max_file_size(),
            public_path: default_public_path(),
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let bytes = read_config(use_local)?;
                    Self::from_toml(&bytes)
                };

                match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Config not found.");
                        std::process::exit(1);
                    }
                }
            })
            .await
    }

    /// Parses a configuration without touching the process-wide cache.
    pub fn from_toml(bytes: &[u8]) -> ConfigResult<Self> {
        let config: Self = toml::from_slice(bytes)?;
        Ok(config)
    }

    /// Leaks a parsed configuration so it can live in `AppState` like the cached one.
    pub fn leak(self) -> &'static Config {
        Box::leak(Box::new(self))
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn uploads(&self) -> &Uploads {
        &self.uploads
    }

    #[inline]
    pub fn events(&self) -> &Events {
        &self.events
    }

    #[inline]
    pub fn mail(&self) -> Option<&Mail> {
        self.mail.as_ref()
    }

    #[inline]
    pub fn google(&self) -> Option<&OAuthProvider> {
        self.oauth.google.as_ref()
    }

    pub fn rate_limit_max_requests(&self) -> u32 {
        let configured = self.rate_limit.as_ref().and_then(|r| r.max_requests);
        configured.unwrap_or(match self.app.environment {
            Environment::Production => 100,
            Environment::Development => 1000,
        })
    }

    pub fn rate_limit_window_secs(&self) -> u64 {
        self.rate_limit
            .as_ref()
            .map(|r| r.window_secs)
            .unwrap_or_else(default_window_secs)
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    #[inline]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[inline]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    #[inline]
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    #[inline]
    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    #[inline]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[inline]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }
}

impl Uploads {
    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }
}

impl Events {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_ms)
    }
}

impl Mail {
    pub fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    pub fn smtp_username(&self) -> &str {
        &self.smtp_username
    }

    pub fn smtp_password(&self) -> &str {
        &self.smtp_password
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    pub fn from_name(&self) -> &str {
        &self.from_name
    }
}

impl OAuthProvider {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"
        [host]
        bindto = "127.0.0.1:5000"

        [app]
        jwt = "secret"
        database_uri = "postgres://localhost/academy"
    "#;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_toml(MINIMAL.as_bytes()).unwrap();
        assert_eq!(config.app().environment(), Environment::Development);
        assert_eq!(config.rate_limit_max_requests(), 1000);
        assert_eq!(config.rate_limit_window_secs(), 900);
        assert_eq!(config.uploads().dir(), "uploads");
        assert_eq!(config.events().max_attempts(), 3);
        assert!(config.mail().is_none());
        assert!(config.google().is_none());
        assert!(!config.app().docs());
    }

    #[test]
    fn production_lowers_rate_limit() {
        let raw = MINIMAL.replace(
            "database_uri = \"postgres://localhost/academy\"",
            "database_uri = \"postgres://localhost/academy\"\nenvironment = \"production\"",
        );
        let config = Config::from_toml(raw.as_bytes()).unwrap();
        assert!(config.app().is_production());
        assert_eq!(config.rate_limit_max_requests(), 100);
    }

    #[test]
    fn explicit_rate_limit_wins() {
        let raw = format!("{MINIMAL}\n[rate_limit]\nmax_requests = 5\nwindow_secs = 10\n");
        let config = Config::from_toml(raw.as_bytes()).unwrap();
        assert_eq!(config.rate_limit_max_requests(), 5);
        assert_eq!(config.rate_limit_window_secs(), 10);
    }

    #[test]
    fn google_oauth_section() {
        let raw = format!(
            "{MINIMAL}\n[oauth.google]\nclient_id = \"id\"\nclient_secret = \"s\"\nredirect_url = \"http://localhost:5000/api/auth/google/callback\"\n"
        );
        let config = Config::from_toml(raw.as_bytes()).unwrap();
        assert_eq!(config.google().map(|g| g.client_id()), Some("id"));
    }

    #[test]
    fn missing_jwt_is_an_error() {
        let raw = "[host]\nbindto = \"x\"\n[app]\ndatabase_uri = \"y\"\n";
        assert!(matches!(
            Config::from_toml(raw.as_bytes()),
            Err(ConfigError::TomlDeError(_))
        ));
    }
}
