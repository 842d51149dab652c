// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A raw report payload, as fetched from the object store.
///
/// The two shapes are distinguished structurally: a payload carrying a
/// `suites` array deserializes as [`RawReport::Nested`], one carrying a
/// top-level `tests` array as [`RawReport::Flat`]. A payload carrying
/// neither fails to deserialize, which the ingestion layer treats as a
/// malformed object to skip.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawReport {
    /// The runner's native nested suite/spec/test/result tree.
    Nested(NestedReport),
    /// A flattened test list from older upload scripts.
    Flat(FlatReport),
}

/// Nested report shape: one entry per suite (typically one per spec file).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedReport {
    /// The suites contained in this report.
    pub suites: Vec<RawSuite>,

    /// Report-level start timestamp. Some runner versions only record start
    /// times per result, so this may be absent.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// A suite: a named group of specs, usually a single spec file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSuite {
    /// The suite title, e.g. `basic-tests.spec.ts`.
    pub title: String,

    /// The specs in this suite.
    #[serde(default)]
    pub specs: Vec<RawSpec>,
}

/// A spec: one test title, executed once per configured project.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpec {
    /// The spec title, e.g. `Should be able to open modal`.
    pub title: String,

    /// One entry per project the spec ran under.
    #[serde(default)]
    pub tests: Vec<RawTest>,
}

/// One (spec, project) execution, possibly with retries.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTest {
    /// The execution project, e.g. `Desktop Firefox/ethers5`.
    pub project_name: String,

    /// Results in attempt order. Retries append further entries; index 0 is
    /// the representative result.
    #[serde(default)]
    pub results: Vec<RawResult>,
}

/// One execution attempt of one test.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    /// Runner status token. Known values are `passed`, `failed`, `timedOut`,
    /// `skipped` and `interrupted`, but the set is open: newer runner
    /// versions may emit tokens this crate has never seen, so this stays a
    /// plain string and is interpreted downstream.
    pub status: String,

    /// When this attempt began.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds. The runner emits fractional
    /// values.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Captured stdout, in emission order.
    #[serde(default)]
    pub stdout: Vec<RawOutputChunk>,

    /// Captured error messages.
    #[serde(default)]
    pub errors: Vec<RawErrorEntry>,
}

/// Flat report shape: a single list of already-flattened tests.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatReport {
    /// The tests contained in this report.
    pub tests: Vec<FlatTest>,

    /// Report-level start timestamp.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// One entry in a flat report.
///
/// The flat shape predates stable identity fields: `id` may be absent, and
/// some producers inline `status`/`duration` on the test itself instead of
/// nesting a `results` array.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTest {
    /// Explicit identity, when the producer assigned one.
    #[serde(default)]
    pub id: Option<String>,

    /// The full test title.
    pub title: String,

    /// The execution project.
    pub project_name: String,

    /// Inline status, used when `results` is absent.
    #[serde(default)]
    pub status: Option<String>,

    /// Inline duration in milliseconds, used when `results` is absent.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Execution attempts, if the producer recorded them.
    #[serde(default)]
    pub results: Vec<RawResult>,
}

/// A captured stdout chunk.
///
/// The runner emits plain strings for text chunks and `{ "text": ... }`
/// objects for chunks that went through its attachment machinery; both
/// occur within a single report.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawOutputChunk {
    /// A bare string chunk.
    Text(String),
    /// An object-wrapped chunk.
    Wrapped {
        /// The chunk text.
        text: String,
    },
}

impl RawOutputChunk {
    /// Returns the chunk text regardless of representation.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Wrapped { text } => text,
        }
    }
}

/// A captured error entry: either a bare message string or an object with a
/// `message` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawErrorEntry {
    /// A bare message.
    Message(String),
    /// An object-wrapped message.
    Wrapped {
        /// The error message.
        message: String,
    },
}

impl RawErrorEntry {
    /// Returns the error message regardless of representation.
    pub fn message(&self) -> &str {
        match self {
            Self::Message(message) | Self::Wrapped { message } => message,
        }
    }
}
