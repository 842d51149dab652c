// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical, normalized form of one ingested report.
//!
//! [`RunSummary`] values are created once per raw payload by
//! [`crate::normalize`], are immutable thereafter, and are only ever read by
//! the aggregator.

use crate::key::RunId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Stable identity of one (test title, project) pair.
///
/// Two instances within the same run never share an id: a test runs at most
/// once per project per run in the canonical model.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Creates the canonical identity for a (title, project) pair:
    /// `<title>|<project>`.
    pub fn new(title: &str, project: &str) -> Self {
        Self(format!("{title}|{project}"))
    }

    /// Wraps an identity string a report producer assigned explicitly.
    pub fn explicit(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical status of one test instance.
///
/// Runner-specific tokens are collapsed during normalization: `failed` and
/// `timedOut` map to [`Failed`](Self::Failed), `passed` to
/// [`Passed`](Self::Passed), and everything else (including `interrupted`
/// and unrecognized tokens) to [`Skipped`](Self::Skipped). The collapse is
/// lossy by design: the statistics layer only distinguishes pass/fail/other.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The test passed.
    Passed,
    /// The test failed or timed out.
    Failed,
    /// The test was skipped, interrupted, or reported an unknown status.
    Skipped,
}

impl TestStatus {
    /// Maps a raw runner status token to its canonical status.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "failed" | "timedOut" => Self::Failed,
            "passed" => Self::Passed,
            _ => Self::Skipped,
        }
    }

    /// Returns true for [`Failed`](Self::Failed).
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One test's outcome within one run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInstance {
    /// Stable identity, unique within the owning run.
    pub id: TestId,

    /// Fully-qualified title: `<suite title> > <spec title>` when suite
    /// nesting exists, the bare title otherwise.
    pub title: String,

    /// The execution project (browser/environment label).
    pub project: String,

    /// Canonical status.
    pub status: TestStatus,

    /// Duration in whole milliseconds, if the raw data carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    /// Captured stdout lines, kept only for diagnostic display; never used
    /// in aggregation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stdout: Vec<String>,

    /// Captured error messages, kept only for diagnostic display.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// One ingested report, after normalization.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Run identity: the store key's filename stem.
    pub run_id: RunId,

    /// When this run began. Always concrete: the earliest per-result start
    /// time, else the report-level start time, else the time of
    /// normalization.
    pub started_at: DateTime<Utc>,

    /// What caused the run (e.g. the CI event type), derived positionally
    /// from the store key. Absent when the key has no trigger segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,

    /// The tests observed in this run, unique by id.
    pub tests: Vec<TestInstance>,
}
