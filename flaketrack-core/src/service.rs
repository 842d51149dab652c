// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The query surface the serving layer calls.
//!
//! [`FlakinessService`] owns an [`ObjectStore`], ingests every report under
//! the configured prefix (skipping individually malformed objects), and
//! answers two questions: the ranked leaderboard for a (year, month) window
//! and the full chronological history of one test identity. Normalized
//! batches are memoized in a [`TtlCache`] so repeated queries within the
//! TTL do not re-list the store.

use crate::{
    aggregate::{FlakyStat, GroupingStrategy, aggregate},
    cache::{DEFAULT_TTL, TtlCache},
    errors::{ServiceError, StoreError},
    key::{DatePartition, RunId},
    normalize::normalize,
    store::{DatePartitions, ObjectStore},
    summary::{RunSummary, TestStatus},
};
use chrono::{DateTime, Utc};
use flaketrack_report::RawReport;
use itertools::Itertools;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Which (year, month) window a query addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSelection {
    /// The most recent window that has any data.
    MostRecent,
    /// An explicit window. Validated, never silently defaulted.
    Explicit {
        /// Calendar year.
        year: i32,
        /// Calendar month, 1-12.
        month: u32,
    },
}

/// The leaderboard for one window.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowReport {
    /// The resolved window year.
    pub year: i32,
    /// The resolved window month.
    pub month: u32,
    /// Distinct trigger values seen in the window, sorted.
    pub triggers: Vec<String>,
    /// Distinct project values seen in the window, sorted.
    pub projects: Vec<String>,
    /// The ranked flakiness statistics.
    pub stats: Vec<FlakyStat>,
    /// All partitions available in the store, for window navigation.
    pub available: DatePartitions,
}

/// One observation in a test's chronological history.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistoryEntry {
    /// The run this observation came from.
    pub run_id: RunId,
    /// When that run began.
    pub started_at: DateTime<Utc>,
    /// Canonical status in that run.
    pub status: TestStatus,
    /// Duration in milliseconds, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Captured stdout lines, for diagnostic display.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stdout: Vec<String>,
    /// Captured error messages, for diagnostic display.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// The full chronological history of one test identity.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistory {
    /// The requested identity.
    pub id: String,
    /// Title carried from the first observed instance.
    pub title: String,
    /// Project carried from the first observed instance.
    pub project: String,
    /// Observations in ascending run start order.
    pub history: Vec<TestHistoryEntry>,
}

struct LoadedRun {
    partition: Option<DatePartition>,
    summary: RunSummary,
}

struct LoadedBatch {
    runs: Vec<LoadedRun>,
    partitions: DatePartitions,
}

/// Ingestion plus query service over one object store.
pub struct FlakinessService<S> {
    store: S,
    prefix: String,
    cache: TtlCache<LoadedBatch>,
}

impl<S: ObjectStore> FlakinessService<S> {
    /// Creates a service with the default cache TTL.
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self::with_ttl(store, prefix, DEFAULT_TTL)
    }

    /// Creates a service with an explicit cache TTL.
    pub fn with_ttl(store: S, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            cache: TtlCache::new(ttl),
        }
    }

    /// Returns the ranked leaderboard for the selected window.
    ///
    /// A valid explicit window with no data yields an empty leaderboard,
    /// not an error; [`WindowSelection::MostRecent`] over a store with no
    /// partitions at all is [`ServiceError::NoData`].
    pub fn window_report(
        &self,
        selection: WindowSelection,
        strategy: GroupingStrategy,
    ) -> Result<WindowReport, ServiceError> {
        let batch = self.load()?;

        let (year, month) = match selection {
            WindowSelection::Explicit { year, month } => {
                validate_window(year, month)?;
                (year, month)
            }
            WindowSelection::MostRecent => {
                batch.partitions.most_recent().ok_or(ServiceError::NoData)?
            }
        };

        let windowed: Vec<&RunSummary> = batch
            .runs
            .iter()
            .filter(|run| {
                run.partition
                    .is_some_and(|p| p.year == year && p.month == month)
            })
            .map(|run| &run.summary)
            .collect();

        let triggers = windowed
            .iter()
            .filter_map(|run| run.trigger.clone())
            .unique()
            .sorted()
            .collect();
        let projects = windowed
            .iter()
            .flat_map(|run| run.tests.iter().map(|test| test.project.clone()))
            .unique()
            .sorted()
            .collect();
        let stats = aggregate(windowed.iter().copied(), strategy);

        Ok(WindowReport {
            year,
            month,
            triggers,
            projects,
            stats,
            available: batch.partitions.clone(),
        })
    }

    /// Returns the full chronological history of one test identity, across
    /// every run in the store.
    pub fn test_history(&self, id: &str) -> Result<TestHistory, ServiceError> {
        let batch = self.load()?;

        let mut runs: Vec<&RunSummary> = batch.runs.iter().map(|run| &run.summary).collect();
        runs.sort_by_key(|run| run.started_at);

        let mut title = None;
        let mut project = None;
        let mut history = Vec::new();
        for run in runs {
            let Some(instance) = run.tests.iter().find(|test| test.id.as_str() == id) else {
                continue;
            };
            title.get_or_insert_with(|| instance.title.clone());
            project.get_or_insert_with(|| instance.project.clone());
            history.push(TestHistoryEntry {
                run_id: run.run_id.clone(),
                started_at: run.started_at,
                status: instance.status,
                duration: instance.duration,
                stdout: instance.stdout.clone(),
                errors: instance.errors.clone(),
            });
        }

        match (title, project) {
            (Some(title), Some(project)) => Ok(TestHistory {
                id: id.to_owned(),
                title,
                project,
                history,
            }),
            _ => Err(ServiceError::TestNotFound { id: id.to_owned() }),
        }
    }

    /// Returns the date partitions available in the store.
    pub fn available_windows(&self) -> Result<DatePartitions, ServiceError> {
        Ok(self.load()?.partitions.clone())
    }

    /// Drops the memoized batch, forcing the next query to re-list the
    /// store.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    fn load(&self) -> Result<std::sync::Arc<LoadedBatch>, StoreError> {
        self.cache.get_or_load(|| self.load_batch())
    }

    /// Lists and ingests every JSON object under the prefix. A listing
    /// failure aborts; a fetch or parse failure of one object is logged and
    /// skipped, and aggregation proceeds best-effort over the rest.
    fn load_batch(&self) -> Result<LoadedBatch, StoreError> {
        let keys = self.store.list()?;
        let now = Utc::now();

        let mut runs = Vec::new();
        for key in keys.iter().filter(|key| key.is_json()) {
            let bytes = match self.store.fetch(key) {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(%key, %error, "skipping unfetchable object");
                    continue;
                }
            };
            let report: RawReport = match serde_json::from_slice(&bytes) {
                Ok(report) => report,
                Err(error) => {
                    warn!(%key, %error, "skipping malformed report");
                    continue;
                }
            };
            runs.push(LoadedRun {
                partition: key.date_partition(&self.prefix),
                summary: normalize(&report, key, &self.prefix, now),
            });
        }

        let partitions =
            DatePartitions::from_keys(keys.iter().filter(|key| key.is_json()), &self.prefix);
        Ok(LoadedBatch { runs, partitions })
    }
}

fn validate_window(year: i32, month: u32) -> Result<(), ServiceError> {
    if !(1970..=9999).contains(&year) {
        return Err(ServiceError::invalid_window(format!(
            "year must be between 1970 and 9999, got {year}"
        )));
    }
    if !(1..=12).contains(&month) {
        return Err(ServiceError::invalid_window(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    Ok(())
}
