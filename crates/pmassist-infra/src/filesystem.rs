//! Data directory layout.
//!
//! ```text
//! {data_dir}/
//!   config.toml
//!   pmassist.db
//! ```

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_FILE: &str = "pmassist.db";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PMASSIST_DATA_DIR` environment variable
/// 2. `~/.pmassist`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PMASSIST_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".pmassist");
    }

    PathBuf::from(".pmassist")
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// SQLite URL for the database file inside `data_dir`, created on first use.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(DATABASE_FILE).display())
}

/// Create `data_dir` if it does not exist yet.
pub async fn ensure_data_dir(data_dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(data_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let data_dir = PathBuf::from("/home/user/.pmassist");
        assert_eq!(
            config_path(&data_dir),
            PathBuf::from("/home/user/.pmassist/config.toml")
        );
        assert_eq!(
            database_url(&data_dir),
            "sqlite:///home/user/.pmassist/pmassist.db?mode=rwc"
        );
    }

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Idempotent.
        ensure_data_dir(&nested).await.unwrap();
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching PMASSIST_DATA_DIR and restores it.
        unsafe {
            std::env::set_var("PMASSIST_DATA_DIR", "/tmp/test-pmassist");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-pmassist"));
        unsafe {
            std::env::remove_var("PMASSIST_DATA_DIR");
        }
    }
}
