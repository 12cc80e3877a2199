use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PowersumError, Result};

pub const CONFIG_FILE: &str = "powersum.toml";
pub const DEFAULT_DATA_FILE: &str = "partition_data.csv";
pub const DEFAULT_BATCH_SIZE: u64 = 250;

/// Directory layout and defaults for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub data_file: String,
    pub batch_size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    directories: DirectoriesSection,
    data_file: Option<String>,
    batch_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoriesSection {
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    backup_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::custom(PathBuf::from("data"))
    }
}

impl Config {
    /// Every directory rooted under `base_dir`; used by tests and by the
    /// built-in defaults.
    pub fn custom(base_dir: PathBuf) -> Self {
        Self {
            output_dir: base_dir.join("tmp"),
            backup_dir: base_dir.join("backups"),
            temp_dir: base_dir.join("tmp"),
            data_dir: base_dir,
            data_file: DEFAULT_DATA_FILE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// The long-lived store that resumed runs append to.
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.data_file)
    }

    /// Defaults, then the TOML file, then `POWERSUM_*` environment variables.
    ///
    /// An explicit `path` must exist; otherwise `powersum.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match path {
            Some(p) if !p.exists() => {
                return Err(PowersumError::Config(format!(
                    "config file does not exist: {}",
                    p.display()
                )));
            }
            Some(p) => config = config.apply_file(p)?,
            None => {
                let local = Path::new(CONFIG_FILE);
                if local.exists() {
                    config = config.apply_file(local)?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok())
    }

    pub fn apply_file(self, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading config file");
        self.apply_toml(&content)
    }

    fn apply_toml(mut self, content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let dirs = file.directories;

        if let Some(d) = dirs.data_dir {
            self.data_dir = d;
        }
        if let Some(d) = dirs.output_dir {
            self.output_dir = d;
        }
        if let Some(d) = dirs.backup_dir {
            self.backup_dir = d;
        }
        if let Some(d) = dirs.temp_dir {
            self.temp_dir = d;
        }
        if let Some(f) = file.data_file {
            self.data_file = f;
        }
        if let Some(b) = file.batch_size {
            self.batch_size = b;
        }
        Ok(self)
    }

    /// Override from environment; `lookup` stands in for `std::env::var`.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Result<Self> {
        if let Some(d) = lookup("POWERSUM_DATA_DIR") {
            self.data_dir = PathBuf::from(d);
        }
        if let Some(d) = lookup("POWERSUM_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(d);
        }
        if let Some(d) = lookup("POWERSUM_BACKUP_DIR") {
            self.backup_dir = PathBuf::from(d);
        }
        if let Some(d) = lookup("POWERSUM_TEMP_DIR") {
            self.temp_dir = PathBuf::from(d);
        }
        if let Some(b) = lookup("POWERSUM_BATCH_SIZE") {
            self.batch_size = b.trim().parse().map_err(|_| {
                PowersumError::Config(format!("POWERSUM_BATCH_SIZE is not a number: {}", b))
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_layout() {
        let config = Config::default();
        assert_eq!(config.data_path(), PathBuf::from("data/partition_data.csv"));
        assert_eq!(config.output_path(), PathBuf::from("data/tmp/partition_data.csv"));
        assert_eq!(config.backup_dir, PathBuf::from("data/backups"));
        assert_eq!(config.batch_size, 250);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::default()
            .apply_toml(
                r#"
                data_file = "custom_partitions.csv"
                batch_size = 100

                [directories]
                data_dir = "/srv/pp"
                backup_dir = "/srv/pp/bak"
                "#,
            )
            .unwrap();

        assert_eq!(config.data_path(), PathBuf::from("/srv/pp/custom_partitions.csv"));
        assert_eq!(config.backup_dir, PathBuf::from("/srv/pp/bak"));
        assert_eq!(config.output_dir, PathBuf::from("data/tmp"));
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("POWERSUM_DATA_DIR", "/env/data"),
            ("POWERSUM_TEMP_DIR", "/env/tmp"),
            ("POWERSUM_BATCH_SIZE", " 50 "),
        ]);
        let config = Config::default()
            .apply_toml("batch_size = 100\n[directories]\ndata_dir = \"/file/data\"\n")
            .unwrap()
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/env/data"));
        assert_eq!(config.temp_dir, PathBuf::from("/env/tmp"));
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_bad_env_batch_size() {
        let err = Config::default()
            .apply_env(|k| (k == "POWERSUM_BATCH_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, PowersumError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            Config::default().apply_toml("batch_size = \"many\""),
            Err(PowersumError::Config(_))
        ));
        assert!(matches!(
            Config::default().apply_toml("[directories]\nunknown_dir = \"x\""),
            Err(PowersumError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("powersum.toml");
        fs::write(&path, "[directories]\noutput_dir = \"/out\"\n").unwrap();

        let config = Config::default().apply_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/out"));

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(PowersumError::Config(_))
        ));
    }
}
