// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of raw report payloads into canonical [`RunSummary`] records.
//!
//! The normalizer is a pure function of its inputs: each raw shape has its
//! own total mapping into the canonical model, and the run start time is
//! resolved through a fixed fallback chain evaluated exactly once per run.

use crate::{
    key::StoreKey,
    summary::{RunSummary, TestId, TestInstance, TestStatus},
};
use chrono::{DateTime, Utc};
use flaketrack_report::{FlatTest, RawErrorEntry, RawOutputChunk, RawReport, RawResult};
use std::collections::HashSet;

/// Normalizes one raw payload plus its store key into a [`RunSummary`].
///
/// `prefix` is the configured store prefix, used for trigger resolution.
/// `now` is the normalization wall-clock time, the last resort of the
/// start-time fallback chain; it is passed in rather than sampled here so
/// the function stays pure.
///
/// A payload with no tests at all normalizes to a summary with an empty
/// `tests` sequence. Structurally unparseable payloads are the caller's
/// concern: by the time a `RawReport` exists, deserialization has already
/// succeeded.
pub fn normalize(
    report: &RawReport,
    key: &StoreKey,
    prefix: &str,
    now: DateTime<Utc>,
) -> RunSummary {
    let mut flattened = match report {
        RawReport::Nested(nested) => flatten_nested(nested),
        RawReport::Flat(flat) => flatten_flat(flat),
    };

    // A test runs at most once per project per run in the canonical model:
    // keep the first instance for each id.
    let mut seen = HashSet::new();
    flattened.tests.retain(|test| seen.insert(test.id.clone()));

    // Start-time fallback chain, in priority order: earliest per-result
    // start time, then the report-level start time, then `now`. Applied
    // once per run, not per test.
    let started_at = [flattened.earliest_result_start, flattened.report_start]
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(now);

    RunSummary {
        run_id: key.run_id(),
        started_at,
        trigger: key.trigger(prefix).map(str::to_owned),
        tests: flattened.tests,
    }
}

/// Intermediate result of flattening one raw shape.
struct Flattened {
    tests: Vec<TestInstance>,
    earliest_result_start: Option<DateTime<Utc>>,
    report_start: Option<DateTime<Utc>>,
}

fn flatten_nested(report: &flaketrack_report::NestedReport) -> Flattened {
    let mut tests = Vec::new();
    let mut earliest = Earliest::default();

    for suite in &report.suites {
        for spec in &suite.specs {
            for test in &spec.tests {
                // The first result is representative; retries beyond index 0
                // are ignored.
                let Some(result) = test.results.first() else {
                    continue;
                };
                earliest.observe(result.start_time);

                tests.push(TestInstance {
                    id: TestId::new(&spec.title, &test.project_name),
                    title: format!("{} > {}", suite.title, spec.title),
                    project: test.project_name.clone(),
                    status: TestStatus::from_raw(&result.status),
                    duration: canonical_duration(result.duration),
                    stdout: stdout_lines(result),
                    errors: error_messages(result),
                });
            }
        }
    }

    Flattened {
        tests,
        earliest_result_start: earliest.into_inner(),
        report_start: report.start_time,
    }
}

fn flatten_flat(report: &flaketrack_report::FlatReport) -> Flattened {
    let mut tests = Vec::new();
    let mut earliest = Earliest::default();

    for test in &report.tests {
        let result = test.results.first();
        if let Some(result) = result {
            earliest.observe(result.start_time);
        }

        // Status and duration come from the first result when a results
        // array exists, from the test's own inline fields otherwise.
        let (raw_status, duration) = match result {
            Some(r) => (r.status.as_str(), r.duration),
            None => (test.status.as_deref().unwrap_or("skipped"), test.duration),
        };

        tests.push(TestInstance {
            id: flat_test_id(test),
            title: test.title.clone(),
            project: test.project_name.clone(),
            status: TestStatus::from_raw(raw_status),
            duration: canonical_duration(duration),
            stdout: result.map(stdout_lines).unwrap_or_default(),
            errors: result.map(error_messages).unwrap_or_default(),
        });
    }

    Flattened {
        tests,
        earliest_result_start: earliest.into_inner(),
        report_start: report.start_time,
    }
}

/// Identity fallback chain for flat entries: the producer-assigned id when
/// present, else a generated `<title>-<project>`.
fn flat_test_id(test: &FlatTest) -> TestId {
    match &test.id {
        Some(id) => TestId::explicit(id.clone()),
        None => TestId::explicit(format!("{}-{}", test.title, test.project_name)),
    }
}

fn canonical_duration(duration: Option<f64>) -> Option<u64> {
    duration.map(|d| d.max(0.0).round() as u64)
}

fn stdout_lines(result: &RawResult) -> Vec<String> {
    result
        .stdout
        .iter()
        .map(|chunk| RawOutputChunk::text(chunk).to_owned())
        .collect()
}

fn error_messages(result: &RawResult) -> Vec<String> {
    result
        .errors
        .iter()
        .map(|entry| RawErrorEntry::message(entry).to_owned())
        .collect()
}

/// Running minimum over observed result start times.
#[derive(Default)]
struct Earliest(Option<DateTime<Utc>>);

impl Earliest {
    fn observe(&mut self, start: Option<DateTime<Utc>>) {
        if let Some(start) = start {
            match self.0 {
                Some(current) if current <= start => {}
                _ => self.0 = Some(start),
            }
        }
    }

    fn into_inner(self) -> Option<DateTime<Utc>> {
        self.0
    }
}
