//! Remote storage for finished archives.
//!
//! A job describes its storage with an opaque key-value map. Only the
//! storage layer interprets it, starting with the `driver` key.

pub mod local;

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::storage::local::LocalStorage;
use sanitize_filename::is_sanitized;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;

pub type StorageConfig = BTreeMap<String, Value>;

pub trait Storage {
    /// Stores everything `stream` yields under `name`. Returns the number of
    /// bytes written.
    fn write_stream(&self, name: &str, stream: &mut dyn Read) -> Result<u64>;

    fn delete(&self, name: &str) -> Result<()>;
}

/// Builds a [`Storage`] from a job's storage config.
pub trait StorageProvider {
    fn storage(&self, config: &StorageConfig) -> Result<Box<dyn Storage>>;
}

/// Provider for the drivers shipped with this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStorageProvider;

impl StorageProvider for DefaultStorageProvider {
    fn storage(&self, config: &StorageConfig) -> Result<Box<dyn Storage>> {
        match config_str(config, "driver")? {
            "local" => Ok(Box::new(LocalStorage::from_config(config)?)),
            driver => Err(Error::unsupported_storage_driver(driver)),
        }
    }
}

pub fn config_str<'a>(config: &'a StorageConfig, key: &str) -> Result<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_storage_option(key))
}

/// Object names are plain file names, never paths.
pub fn check_object_name(name: &str) -> Result<()> {
    if name.is_empty() || !is_sanitized(name) || name == "." || name == ".." {
        return Err(Error::invalid_object_name(name));
    }
    Ok(())
}
