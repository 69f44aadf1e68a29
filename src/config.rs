//! Process configuration read from the environment at startup.

use std::env;
use std::str::FromStr;

use crate::metrics::BlownRule;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "prop_journal.db";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Supabase,
    Local,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(BackendKind::Supabase),
            "local" => Ok(BackendKind::Local),
            other => Err(format!("Unknown backend: {} (expected supabase or local)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub backend: BackendKind,
    pub db_path: String,
    pub server_host: String,
    pub port: u16,
    pub site_url: String,
    pub blown_rule: BlownRule,
}

impl Config {
    pub fn from_env() -> Result<Config, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let supabase_url = var("SUPABASE_URL").unwrap_or_default();
        let supabase_anon_key = var("SUPABASE_ANON_KEY").unwrap_or_default();

        let backend = match var("JOURNAL_BACKEND") {
            Some(raw) => raw.parse()?,
            None => BackendKind::default(),
        };

        if backend == BackendKind::Supabase {
            // Requests fail downstream instead
            if supabase_url.is_empty() {
                log::error!("SUPABASE_URL is not set");
            }
            if supabase_anon_key.is_empty() {
                log::error!("SUPABASE_ANON_KEY is not set");
            }
        }

        let port = match var("SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|e| format!("Invalid SERVER_PORT {}: {}", raw, e))?,
            None => DEFAULT_PORT,
        };

        let blown_rule = match var("BLOWN_RULE") {
            Some(raw) => raw.to_lowercase().parse()?,
            None => BlownRule::default(),
        };

        Ok(Config {
            supabase_url,
            supabase_anon_key,
            backend,
            db_path: var("JOURNAL_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            server_host: var("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            site_url: var("SITE_URL")
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            blown_rule,
        })
    }

    /// Where the emailed password-reset link lands.
    pub fn reset_redirect(&self) -> String {
        format!("{}/reset-password", self.site_url)
    }

    pub fn log_summary(&self) {
        log::info!("Backend: {:?}", self.backend);
        match self.backend {
            BackendKind::Supabase => {
                log::info!("Supabase URL: {}", self.supabase_url);
                log::info!("Supabase anon key: {}", mask(&self.supabase_anon_key));
            }
            BackendKind::Local => log::info!("Local database: {}", self.db_path),
        }
        log::info!("Blown rule: {}", self.blown_rule);
        log::info!("Site URL: {}", self.site_url);
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
