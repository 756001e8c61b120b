use super::{CellPolicyArg, SynchronousArg};
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub database: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub create_labels: Option<bool>,
    pub cell_policy: Option<CellPolicyArg>,
    pub synchronous: Option<SynchronousArg>,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
    profiles: HashMap<String, Profile>,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        let profiles = parse_profiles(&data)?;
        Ok(Self {
            path,
            data,
            profiles,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_db_path(&self) -> Option<&PathBuf> {
        self.data.database.default_path.as_ref()
    }

    /// Picks the requested profile, else the configured default, else none.
    pub fn select(&self, requested: Option<&str>) -> Result<Option<&Profile>, ConfigError> {
        match requested {
            Some(name) => self
                .profiles
                .get(name)
                .map(Some)
                .ok_or_else(|| ConfigError::ProfileNotFound {
                    name: name.to_string(),
                }),
            None => Ok(self
                .data
                .default_profile
                .as_deref()
                .and_then(|name| self.profiles.get(name))),
        }
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_profiles(data: &RawConfig) -> Result<HashMap<String, Profile>, ConfigError> {
    let mut profiles = HashMap::new();
    for (name, raw) in &data.profiles {
        profiles.insert(name.clone(), convert_profile(name, raw)?);
    }
    if let Some(default_name) = data.default_profile.as_ref() {
        if !profiles.contains_key(default_name) {
            return Err(ConfigError::ProfileNotFound {
                name: default_name.clone(),
            });
        }
    }
    Ok(profiles)
}

fn parse_enum<T: ValueEnum>(
    profile: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        T::from_str(value, true).map_err(|_| ConfigError::InvalidValue {
            profile: profile.to_string(),
            field,
            value: value.to_string(),
        })
    })
    .transpose()
}

fn convert_profile(name: &str, raw: &RawProfile) -> Result<Profile, ConfigError> {
    Ok(Profile {
        name: name.to_string(),
        database: raw.database.clone(),
        batch_size: raw.batch_size,
        create_labels: raw.create_labels,
        cell_policy: parse_enum(name, "cell_policy", raw.cell_policy.as_deref())?,
        synchronous: parse_enum(name, "synchronous", raw.synchronous.as_deref())?,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    profiles: HashMap<String, RawProfile>,
    #[serde(default)]
    default_profile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    #[serde(rename = "default")]
    default_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    database: Option<PathBuf>,
    batch_size: Option<usize>,
    create_labels: Option<bool>,
    cell_policy: Option<String>,
    synchronous: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },
    #[error("profile '{profile}' {field} value '{value}' is invalid")]
    InvalidValue {
        profile: String,
        field: &'static str,
        value: String,
    },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphport").join("cli.toml"))
}
