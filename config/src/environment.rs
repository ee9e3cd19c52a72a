use std::{env, path::PathBuf};

use crate::ConfigError;

const PROJECT_DIR: &str = ".pcfdev";

/// Process environment captured once at startup, then passed around explicitly.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub home: Option<PathBuf>,
    pub pcfdev_home: Option<PathBuf>,
    pub term: Option<String>,
}

impl Environment {
    pub fn new(home: Option<PathBuf>, pcfdev_home: Option<PathBuf>) -> Self {
        Self {
            home,
            pcfdev_home,
            term: None,
        }
    }

    pub fn from_process() -> Self {
        Self {
            home: Self::var("HOME").map(PathBuf::from),
            pcfdev_home: Self::var("PCFDEV_HOME").map(PathBuf::from),
            term: Self::var("TERM"),
        }
    }

    /// `$PCFDEV_HOME`, else `$HOME/.pcfdev`.
    pub fn home_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(pcfdev_home) = &self.pcfdev_home {
            return Ok(pcfdev_home.clone());
        }
        self.home
            .as_ref()
            .map(|home| home.join(PROJECT_DIR))
            .ok_or(ConfigError::MissingHome)
    }

    fn var(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.is_empty())
    }
}
