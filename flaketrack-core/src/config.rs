// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store configuration.
//!
//! The store coordinates are required: without them the process has nothing
//! to aggregate, so a missing value is fatal at startup rather than
//! defaulted.

use crate::errors::ConfigError;
use camino::Utf8PathBuf;

/// Environment variable naming the store root directory.
pub const STORE_ROOT_VAR: &str = "FLAKETRACK_STORE_ROOT";
/// Environment variable naming the key prefix reports live under.
pub const STORE_PREFIX_VAR: &str = "FLAKETRACK_STORE_PREFIX";

/// Where raw reports are stored.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Root of the object store (a local directory for [`crate::store::FsStore`]).
    pub root: Utf8PathBuf,
    /// Key prefix under which report objects live, without a trailing slash.
    pub prefix: String,
}

impl StoreConfig {
    /// Creates a config from explicit values. Trailing slashes on the
    /// prefix are stripped so key arithmetic stays uniform.
    pub fn new(root: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self {
            root: root.into(),
            prefix,
        }
    }

    /// Reads the config from the environment. Missing variables are a fatal
    /// [`ConfigError`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(None, None)
    }

    /// Resolves each coordinate from an explicit override, falling back to
    /// its environment variable. A coordinate available from neither source
    /// is a fatal [`ConfigError`].
    pub fn resolve(
        root: Option<Utf8PathBuf>,
        prefix: Option<String>,
    ) -> Result<Self, ConfigError> {
        let root = match root {
            Some(root) => root,
            None => required_var(STORE_ROOT_VAR)?.into(),
        };
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => required_var(STORE_PREFIX_VAR)?,
        };
        Ok(Self::new(root, prefix))
    }
}

fn required_var(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::missing(var)),
    }
}
