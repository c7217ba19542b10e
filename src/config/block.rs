//! Hierarchical key/value configuration store.
//!
//! Keys are `:`-separated paths (`segmentor:threshold:invert`). Values are kept
//! as strings and parsed on read, so a block can be filled from any textual
//! source and handed to algorithms that decide their own types.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between key path components.
pub const BLOCK_SEP: &str = ":";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration key '{0}'")]
    MissingKey(String),

    #[error("Invalid value '{value}' for key '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigBlock {
    values: BTreeMap<String, String>,
}

impl ConfigBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a value.
    pub fn get<T: FromStr>(&self, key: &str) -> ConfigResult<T> {
        let raw = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Read a value, falling back to `default` when the key is absent. A
    /// present but unparsable value is still an error.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> ConfigResult<T> {
        if self.has(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Raw string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    /// Set only if the key is absent.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.values
            .entry(key.into())
            .or_insert_with(|| value.to_string());
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Everything under `prefix:`, with the prefix stripped.
    pub fn subblock(&self, prefix: &str) -> ConfigBlock {
        let lead = format!("{}{}", prefix, BLOCK_SEP);
        let values = self
            .values
            .range(lead.clone()..)
            .take_while(|(k, _)| k.starts_with(&lead))
            .map(|(k, v)| (k[lead.len()..].to_string(), v.clone()))
            .collect();
        ConfigBlock { values }
    }

    /// Copy `block` in under `prefix:`.
    pub fn set_subblock(&mut self, prefix: &str, block: &ConfigBlock) {
        for (key, value) in &block.values {
            self.values
                .insert(format!("{}{}{}", prefix, BLOCK_SEP, key), value.clone());
        }
    }

    /// Overlay `other` onto this block; keys in `other` win.
    pub fn merge(&mut self, other: &ConfigBlock) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for ConfigBlock {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut block = ConfigBlock::new();
        for (k, v) in iter {
            block.set(k, v);
        }
        block
    }
}

/// Scalars accepted when deserializing; all are stored as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl<'de> Deserialize<'de> for ConfigBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
        let values = raw
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Scalar::Bool(b) => b.to_string(),
                    Scalar::Int(i) => i.to_string(),
                    Scalar::Float(f) => f.to_string(),
                    Scalar::Str(s) => s,
                };
                (k, v)
            })
            .collect();
        Ok(ConfigBlock { values })
    }
}

impl fmt::Display for ConfigBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.values {
            writeln!(f, "{} = {}", key, value)?;
        }
        Ok(())
    }
}
