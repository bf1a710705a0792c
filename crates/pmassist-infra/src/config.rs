//! Configuration loader for pmassist.
//!
//! Reads `config.toml` (from the data directory, or an explicit `--config`
//! path) into [`AppConfig`], then applies environment overrides. A missing
//! or malformed file yields defaults.

use std::path::Path;

use secrecy::SecretString;

use pmassist_types::config::AppConfig;

/// Database URL override.
pub const ENV_DB_URI: &str = "DB_URI";
pub const ENV_API_KEY: &str = "LITELLM_API_KEY";
pub const ENV_BASE_URL: &str = "LITELLM_BASE_URL";
pub const ENV_MODEL: &str = "PMASSIST_MODEL";

/// Load configuration from `path` and apply environment overrides.
pub async fn load_config(path: &Path) -> AppConfig {
    let config = read_config_file(path).await;
    apply_env_overrides(config)
}

async fn read_config_file(path: &Path) -> AppConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            AppConfig::default()
        }
    }
}

/// Apply `DB_URI`, `LITELLM_API_KEY`, `LITELLM_BASE_URL` and `PMASSIST_MODEL`.
pub fn apply_env_overrides(config: AppConfig) -> AppConfig {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Apply overrides from an arbitrary lookup. Empty values are ignored.
pub fn apply_overrides(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = var(ENV_DB_URI) {
        config.database.url = Some(url);
    }
    if let Some(key) = var(ENV_API_KEY) {
        config.llm.api_key = Some(SecretString::from(key));
    }
    if let Some(base_url) = var(ENV_BASE_URL) {
        config.llm.base_url = Some(base_url);
    }
    if let Some(model) = var(ENV_MODEL) {
        config.llm.model = model;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(&tmp.path().join("config.toml")).await;
        assert_eq!(config.server.port, 8000);
        assert!(config.llm.api_key.is_none());
    }

    #[tokio::test]
    async fn read_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[server]
port = 9100

[llm]
model = "gpt-4o"

[agent]
max_iterations = 3
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(&path).await;
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[tokio::test]
    async fn read_malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "this is [not valid toml =")
            .await
            .unwrap();

        let config = read_config_file(&path).await;
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DB_URI, "sqlite::memory:"),
            (ENV_API_KEY, "sk-env"),
            (ENV_BASE_URL, "http://litellm:4000"),
            (ENV_MODEL, "gpt-4.1"),
        ]);
        let config = apply_overrides(AppConfig::default(), |name| {
            env.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.llm.api_key.unwrap().expose_secret(), "sk-env");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://litellm:4000"));
        assert_eq!(config.llm.model, "gpt-4.1");
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let mut base = AppConfig::default();
        base.llm.model = "from-file".to_string();
        let config = apply_overrides(base, |name| match name {
            ENV_MODEL => Some("  ".to_string()),
            ENV_API_KEY => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.llm.model, "from-file");
        assert!(config.llm.api_key.is_none());
        assert!(config.database.url.is_none());
    }
}
