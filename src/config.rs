use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::exec_normalizer::compile_wrapper;
use crate::utils::xdg;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub launchers: LauncherConfig,
    pub cache: CacheConfig,
    pub matching: MatchingConfig,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LauncherConfig {
    /// Каталоги с .desktop-файлами в порядке убывания приоритета.
    /// Пустой список означает "взять из XDG_DATA_DIRS".
    #[serde(default)]
    pub directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Дополнительные шаблоны обёрток, проверяются после встроенных
    #[serde(default)]
    pub extra_wrappers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub source: String,
    pub polling_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            launchers: LauncherConfig {
                directories: Vec::new(),
            },
            cache: CacheConfig {
                refresh_interval_ms: 200,
            },
            matching: MatchingConfig {
                extra_wrappers: Vec::new(),
            },
            window: WindowConfig {
                source: "wmctrl".to_string(),
                polling_interval_ms: 1000,
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("LAUNCHER_MATCH_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        if self.cache.refresh_interval_ms == 0 {
            anyhow::bail!("refresh_interval_ms должно быть больше 0");
        }

        for (i, pattern) in self.matching.extra_wrappers.iter().enumerate() {
            if pattern.trim().is_empty() {
                anyhow::bail!("Пустой шаблон обёртки #{}", i + 1);
            }
            compile_wrapper(pattern)
                .with_context(|| format!("Некорректный шаблон обёртки #{}: {}", i + 1, pattern))?;
        }

        match self.window.source.as_str() {
            "wmctrl" | "dry_run" => {}
            _ => anyhow::bail!("Неверный источник окон: {}", self.window.source),
        }

        if self.window.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.cache.refresh_interval_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.window.polling_interval_ms)
    }

    /// Каталоги лаунчеров: явно заданные или стандартные XDG
    pub fn launcher_directories(&self) -> Vec<PathBuf> {
        if self.launchers.directories.is_empty() {
            xdg::application_dirs()
        } else {
            self.launchers.directories.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.cache.refresh_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.source = "xdotool".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.polling_interval_ms = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.matching.extra_wrappers = vec!["(unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_merges_toml_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[cache]\nrefresh_interval_ms = 500\n\n[matching]\nextra_wrappers = [\"wine\"]\n\n[launchers]\ndirectories = [\"/opt/apps\"]"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cache.refresh_interval_ms, 500);
        assert_eq!(config.matching.extra_wrappers, vec!["wine".to_string()]);
        assert_eq!(config.launcher_directories(), vec![PathBuf::from("/opt/apps")]);
        // Не заданные в файле секции берутся из значений по умолчанию
        assert_eq!(config.window.polling_interval_ms, 1000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
