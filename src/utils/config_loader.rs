use async_trait::async_trait;
use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::{env, fs};
use thiserror::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Error loading config: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait ConfigLoader {
    type SectionType;

    async fn load_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError>;
}

pub trait ConfigLoaderSync {
    type SectionType;

    fn load_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError>;
}

pub async fn load_from_file<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = tokio::fs::read_to_string(file_name).await?;
    parse_toml(&contents)
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = fs::read_to_string(file_name)?;
    parse_toml(&contents)
}

/// Expands `${VAR}` references from the environment, then parses TOML.
pub fn parse_toml<T: DeserializeOwned>(raw_config: &str) -> Result<T, LoadConfigError> {
    let contents = expand_vars(raw_config)?;
    Ok(toml::from_str(&contents)?)
}

fn expand_vars(raw_config: &str) -> Result<String, LoadConfigError> {
    let re = Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)\}").map_err(|e| LoadConfigError::ConfigError(e.to_string()))?;
    Ok(re
        .replace_all(raw_config, |caps: &Captures| match env::var(&caps[1]) {
            Ok(val) => val,
            Err(_) => caps[0].to_string(),
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_is_left_untouched() -> eyre::Result<()> {
        let expanded = expand_vars("url = \"${FLASH_ARB_SURELY_UNSET_VAR}\"")?;
        assert_eq!(expanded, "url = \"${FLASH_ARB_SURELY_UNSET_VAR}\"");
        Ok(())
    }

    #[test]
    fn test_known_variable_is_expanded() -> eyre::Result<()> {
        let Ok(path) = env::var("PATH") else {
            return Ok(());
        };
        let expanded = expand_vars("p = \"${PATH}\"")?;
        assert_eq!(expanded, format!("p = \"{path}\""));
        Ok(())
    }
}
