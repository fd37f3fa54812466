use crate::config::EngineConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by merging TOML and environment variables.
    ///
    /// Missing files fall back to defaults; `ARB_`-prefixed environment
    /// variables take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::from(figment::providers::Serialized::defaults(
            EngineConfig::default(),
        ))
        .merge(Toml::file("config/Engine.toml"))
        .merge(Env::prefixed("ARB_").split("__"))
        .extract()?;

        Ok(config)
    }

    /// Loads engine configuration with a profile overlay
    /// (`config/Engine.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_with_profile(profile: &str) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::from(figment::providers::Serialized::defaults(
            EngineConfig::default(),
        ))
        .merge(Toml::file("config/Engine.toml"))
        .merge(Toml::file(format!("config/Engine.{profile}.toml")))
        .merge(Env::prefixed("ARB_").split("__"))
        .extract()?;

        Ok(config)
    }
}
