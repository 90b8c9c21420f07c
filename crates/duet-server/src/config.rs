use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use duet_api::companion::DEFAULT_GEMINI_MODEL;

/// Secrets that ship in examples and must never reach a running server.
const PLACEHOLDER_SECRETS: [&str; 4] = ["dev-secret-change-me", "change-me", "changeme", "secret"];

/// Server settings, read from the environment after `.env` is loaded.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub blob_dir: PathBuf,
    /// Base URL clients use to reach this server; blob URLs are built on it.
    pub public_url: String,
    pub jwt_secret: String,
    pub girlfriend_password: String,
    pub boyfriend_password: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let host = var("DUET_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("DUET_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("DUET_PORT is not a port number")?;

        let jwt_secret = var("DUET_JWT_SECRET").context("DUET_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DUET_JWT_SECRET is a placeholder value, refusing to start");
        }

        let girlfriend_password =
            var("DUET_GIRLFRIEND_PASSWORD").context("DUET_GIRLFRIEND_PASSWORD must be set")?;
        let boyfriend_password =
            var("DUET_BOYFRIEND_PASSWORD").context("DUET_BOYFRIEND_PASSWORD must be set")?;
        if girlfriend_password.trim() == boyfriend_password.trim() {
            bail!("the two portal passwords must differ");
        }

        Ok(Self {
            public_url: var("DUET_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            host,
            port,
            db_path: var("DUET_DB_PATH").unwrap_or_else(|| "duet.db".into()).into(),
            blob_dir: var("DUET_BLOB_DIR").unwrap_or_else(|| "storage/memories".into()).into(),
            jwt_secret,
            girlfriend_password,
            boyfriend_password,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("DUET_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("DUET_HOST/DUET_PORT do not form a socket address")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DUET_JWT_SECRET", "a-long-random-string"),
        ("DUET_GIRLFRIEND_PASSWORD", "moonlight"),
        ("DUET_BOYFRIEND_PASSWORD", "sunrise"),
    ];

    #[test]
    fn defaults_fill_optional_settings() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_secret_is_refused() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("DUET_JWT_SECRET", "dev-secret-change-me");
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn missing_or_shared_passwords_are_refused() {
        assert!(Config::from_lookup(lookup(&REQUIRED[..2])).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("DUET_BOYFRIEND_PASSWORD", " moonlight ");
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn public_url_loses_trailing_slash() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DUET_PUBLIC_URL", "https://duet.example/"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.public_url, "https://duet.example");
    }
}
