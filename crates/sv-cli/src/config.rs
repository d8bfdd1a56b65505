//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sv_core::EvaluationParams;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default evaluation parameters, overridable per invocation.
    #[serde(default)]
    pub evaluation: EvaluationParams,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Layers, later ones winning: built-in defaults, the platform config
    /// file, `config_path`, then `SV_*` environment variables with `__`
    /// separating nested keys (`SV_EVALUATION__TOLERANCE=3`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SV_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for spikeval.
///
/// On Linux: `~/.config/spikeval`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("spikeval"))
}
