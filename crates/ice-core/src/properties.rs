//! Property store.
//!
//! Properties are plain `key = value` strings shared by every consumer of a
//! runtime instance. The store is internally synchronized; callers never need
//! the communicator lock to read or write it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use crate::config::PropertyNames;
use crate::error::{IceError, Result};

/// Thread-safe string property map.
#[derive(Debug, Default)]
pub struct Properties {
    values: RwLock<BTreeMap<String, String>>,
}

impl Clone for Properties {
    fn clone(&self) -> Self {
        Self {
            values: RwLock::new(self.snapshot()),
        }
    }
}

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value. Absent keys yield an empty string.
    pub fn get_property(&self, key: &str) -> String {
        self.get_property_with_default(key, "")
    }

    pub fn get_property_with_default(&self, key: &str, default: &str) -> String {
        self.read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Get a property as an integer, or `0` when absent.
    pub fn get_property_as_int(&self, key: &str) -> Result<i64> {
        self.get_property_as_int_with_default(key, 0)
    }

    /// Get a property as an integer.
    ///
    /// Fails with a configuration error when the property is set to
    /// something that is not an integer.
    pub fn get_property_as_int_with_default(&self, key: &str, default: i64) -> Result<i64> {
        match self.read().get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| IceError::Config {
                message: format!("property `{}` is not an integer: `{}`", key, value),
            }),
        }
    }

    /// Set a property. An empty value removes the key.
    pub fn set_property(&self, key: &str, value: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let mut values = self.write();
        if value.is_empty() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value.to_string());
        }
    }

    /// All properties whose key starts with `prefix`.
    pub fn get_properties_for_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy of the full property map.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Extract `--<prefix>.key=value` options from `args`.
    ///
    /// Matching options are applied to the store and removed from `args`;
    /// everything else is returned untouched in its original order. An option
    /// without `=` sets the value to `1`.
    pub fn parse_command_line_options(&self, prefix: &str, args: &mut Vec<String>) {
        let option = format!("--{}.", prefix);
        args.retain(|arg| {
            let Some(rest) = arg.strip_prefix(&option) else {
                return true;
            };
            let (key, value) = match rest.split_once('=') {
                Some((key, value)) => (key, value),
                None => (rest, "1"),
            };
            self.set_property(&format!("{}.{}", prefix, key), value);
            false
        });
    }

    /// Extract runtime (`--Ice.*`) options from `args`.
    pub fn parse_ice_command_line_options(&self, args: &mut Vec<String>) {
        self.parse_command_line_options(PropertyNames::RUNTIME_PREFIX, args);
    }

    /// Load `key = value` lines from a file.
    ///
    /// Blank lines and lines starting with `#` are ignored. Keys and values
    /// are trimmed. A line without `=` is a configuration error.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| IceError::io_with_path(e, path))?;

        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| IceError::Config {
                message: format!("{}:{}: expected `key = value`", path.display(), lineno + 1),
            })?;
            self.set_property(key.trim(), value.trim());
        }

        tracing::debug!("Loaded properties from {}", path.display());
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }
}
