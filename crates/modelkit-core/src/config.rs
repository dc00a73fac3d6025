//! Configuration provider.
//!
//! Named configuration may override the table name, pool name and prefix
//! flag of any model, keyed by the model's real class name under
//! `models.<RealClass>`. Connection-wide settings live under `db`.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Per-model override read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelOverride {
    /// Table name, optionally `database.table`.
    pub name: Option<String>,
    /// Pool name.
    pub pool_name: Option<String>,
    /// Prefix flag.
    pub prefix: Option<bool>,
}

/// Structured configuration lookup.
pub trait ConfigProvider: Send + Sync {
    /// Value stored under a dotted key.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Override for a model, read from `models.<real_class>`.
    ///
    /// An override that does not have the expected shape is a
    /// configuration error of the model.
    fn model_override(&self, real_class: &str) -> Result<Option<ModelOverride>> {
        let Some(value) = self.get(&format!("models.{real_class}")) else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|e| {
            Error::configuration(real_class, format!("malformed model override: {e}"))
        })
    }
}

/// Provider without any configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyConfig;

impl ConfigProvider for EmptyConfig {
    fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }
}

/// Provider backed by a JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    root: serde_json::Value,
}

impl JsonConfig {
    /// Wrap a JSON tree.
    pub fn new(root: serde_json::Value) -> Self {
        Self { root }
    }

    /// Parse a JSON string.
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(source)?))
    }
}

impl ConfigProvider for JsonConfig {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        // The class segment may itself contain dots; match it whole.
        if let Some(class) = key.strip_prefix("models.") {
            return self.root.get("models")?.get(class).cloned();
        }
        let mut node = &self.root;
        for segment in key.split('.') {
            node = node.get(segment)?;
        }
        Some(node.clone())
    }
}

/// Connection-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrmSettings {
    /// Pool used when a model names none.
    pub default_pool: Option<String>,
    /// Prefix prepended to tables that opt in.
    pub table_prefix: String,
}

impl OrmSettings {
    /// Read `db.defaultPool` and `db.prefix`.
    pub fn from_config(config: &dyn ConfigProvider) -> Self {
        let as_string = |key: &str| {
            config
                .get(key)
                .and_then(|v| v.as_str().map(ToString::to_string))
        };
        Self {
            default_pool: as_string("db.defaultPool"),
            table_prefix: as_string("db.prefix").unwrap_or_default(),
        }
    }
}
