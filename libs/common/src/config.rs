//! Layered configuration loading
//!
//! Priority (highest first):
//! 1. Environment variables, `{PREFIX}_` with `__` separating nested keys
//! 2. The configuration file (YAML, TOML or JSON by extension)
//! 3. `T::default()`

use std::path::Path;

use errors::{AcqError, AcqResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};

/// Build the provider stack without extracting
pub fn figment_for<T>(path: Option<&Path>, env_prefix: &str) -> AcqResult<Figment>
where
    T: Serialize + Default,
{
    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(AcqError::configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| AcqError::configuration("config file must have an extension"))?;
        figment = match extension.as_str() {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            other => {
                return Err(AcqError::configuration(format!(
                    "unsupported config file format: {}",
                    other
                )))
            },
        };
    }

    let prefix = format!("{}_", env_prefix.trim_end_matches('_').to_uppercase());
    Ok(figment.merge(Env::prefixed(&prefix).split("__")))
}

/// Load `T` from defaults, an optional file and the environment
pub fn load_config<T>(path: Option<&Path>, env_prefix: &str) -> AcqResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    figment_for::<T>(path, env_prefix)?
        .extract()
        .map_err(|e| AcqError::configuration(format!("failed to load configuration: {}", e)))
}
