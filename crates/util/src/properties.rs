//! Property and environment sources consumed by endpoint resolution.
//!
//! Properties are flat dotted keys (`functions.pricing.url`). Nested YAML or
//! JSON documents are flattened on load so `functions: { pricing: { url: .. } }`
//! and a literal `functions.pricing.url` key are equivalent.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// A read-only source of configuration properties.
pub trait PropertySource: Send + Sync {
    /// Look up a property by its dotted key.
    fn property(&self, key: &str) -> Option<String>;
}

/// A read-only view of environment variables.
pub trait EnvironmentSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Error returned when a `key=value` override cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid property override '{input}'; expected key=value")]
pub struct PropertyOverrideError {
    pub input: String,
}

/// An ordered set of flattened properties.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Properties {
    values: IndexMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut properties = Self::new();
        for (key, value) in pairs {
            properties.insert(key, value);
        }
        properties
    }

    /// Flatten a structured document into dotted keys.
    ///
    /// Mappings contribute `parent.child` keys, sequences contribute
    /// `parent[index]` keys, and scalars are stored in their display form.
    /// `null` leaves are skipped.
    pub fn from_value(document: &Value) -> Self {
        let mut properties = Self::new();
        flatten_into(&mut properties.values, None, document);
        properties
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse and apply a single `key=value` override.
    pub fn apply_override(&mut self, input: &str) -> Result<(), PropertyOverrideError> {
        let (key, value) = input.split_once('=').ok_or_else(|| PropertyOverrideError { input: input.to_string() })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(PropertyOverrideError { input: input.to_string() });
        }
        self.insert(key, value.trim());
        Ok(())
    }
}

impl PropertySource for Properties {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

fn flatten_into(target: &mut IndexMap<String, String>, prefix: Option<String>, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_key = match &prefix {
                    Some(parent) => format!("{parent}.{key}"),
                    None => key.clone(),
                };
                flatten_into(target, Some(child_key), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let child_key = format!("{}[{index}]", prefix.as_deref().unwrap_or_default());
                flatten_into(target, Some(child_key), child);
            }
        }
        Value::Null => {}
        Value::String(text) => {
            if let Some(key) = prefix {
                target.insert(key, text.clone());
            }
        }
        scalar => {
            if let Some(key) = prefix {
                target.insert(key, scalar.to_string());
            }
        }
    }
}

/// Stack of property sources where later layers override earlier ones.
#[derive(Clone, Default)]
pub struct LayeredProperties {
    layers: Vec<Arc<dyn PropertySource>>,
}

impl LayeredProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a layer with higher precedence than every existing layer.
    pub fn with_layer(mut self, layer: Arc<dyn PropertySource>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl PropertySource for LayeredProperties {
    fn property(&self, key: &str) -> Option<String> {
        self.layers.iter().rev().find_map(|layer| layer.property(key))
    }
}

impl std::fmt::Debug for LayeredProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredProperties").field("layers", &self.layers.len()).finish()
    }
}

/// Fetch a property and discard blank values so they count as absent.
pub fn non_blank_property(source: &dyn PropertySource, key: &str) -> Option<String> {
    source.property(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
