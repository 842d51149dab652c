// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by flaketrack.
//!
//! The taxonomy follows operator responses: configuration errors are fatal
//! at startup, store errors mean "could not reach the data source", and
//! service errors distinguish "bad request" from "no data for this window"
//! from "unknown test id". Malformed individual payloads are not errors at
//! all — ingestion skips them and aggregates best-effort over the rest.

use camino::Utf8PathBuf;
use thiserror::Error;

/// A required configuration value was missing or unusable. Fatal at process
/// start.
#[derive(Clone, Debug, Error)]
#[error("missing required configuration: {var} must be set")]
pub struct ConfigError {
    var: &'static str,
}

impl ConfigError {
    pub(crate) fn missing(var: &'static str) -> Self {
        Self { var }
    }

    /// The environment variable that was missing.
    pub fn var(&self) -> &'static str {
        self.var
    }
}

/// An error reaching the object store. These abort the operation that
/// needed the store; they are never produced for individual malformed
/// payloads.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Listing the key space failed.
    #[error("failed to list objects under `{path}`")]
    List {
        /// The root that was being listed.
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Reading one object failed.
    #[error("failed to read object `{key}`")]
    Read {
        /// The key being fetched.
        key: String,
        #[source]
        error: std::io::Error,
    },
}

/// An error answering a query.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An explicit window was requested with a missing or out-of-range
    /// year/month. A client error, never silently defaulted.
    #[error("invalid window: {reason}")]
    InvalidWindow {
        /// Why the window was rejected.
        reason: String,
    },

    /// The store holds no report partitions at all, so no "most recent"
    /// window exists.
    #[error("no report data available in the store")]
    NoData,

    /// No run in the aggregated data contains the requested test id.
    #[error("no history found for test `{id}`")]
    TestNotFound {
        /// The requested test id.
        id: String,
    },

    /// The store could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub(crate) fn invalid_window(reason: impl Into<String>) -> Self {
        Self::InvalidWindow {
            reason: reason.into(),
        }
    }
}
