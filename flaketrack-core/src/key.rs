// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and trigger resolution from object-store keys.
//!
//! Reports are stored under keys of the form
//! `<prefix>/year=YYYY/month=MM/day=DD/<trigger>/<run-id>.json`. The
//! resolver is positional, not content-based: it counts path components
//! after the configured prefix and does not validate that the partition
//! segments look like dates. Keys shorter than the expected depth resolve
//! to "no trigger", never to an error.

use serde::Serialize;
use std::fmt;

/// Number of date-partition segments between the prefix and the trigger.
const DATE_PARTITION_DEPTH: usize = 3;

/// Identity of one run: the store key's filename stem.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Returns the run id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `year=YYYY/month=MM/day=DD` partition parsed from a key.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DatePartition {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
}

/// An object-store key, with accessors for the identity information encoded
/// in its path structure.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreKey(String);

impl StoreKey {
    /// Creates a store key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path component of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The run id: the filename with its extension stripped.
    pub fn run_id(&self) -> RunId {
        let name = self.file_name();
        let stem = match name.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => name,
        };
        RunId(stem.to_owned())
    }

    /// The path segments following `<prefix>/`, or `None` if the key does
    /// not live under the prefix.
    fn segments_after<'a>(&'a self, prefix: &str) -> Option<impl Iterator<Item = &'a str>> {
        let rest = self.0.strip_prefix(prefix)?.strip_prefix('/')?;
        Some(rest.split('/'))
    }

    /// The trigger segment: the path component immediately following the
    /// date partition. Absent when the key has fewer components than
    /// `<date partition>/<trigger>/<filename>` requires.
    pub fn trigger(&self, prefix: &str) -> Option<&str> {
        let segments: Vec<_> = self.segments_after(prefix)?.collect();
        // The trigger must be followed by at least the filename segment.
        if segments.len() > DATE_PARTITION_DEPTH + 1 {
            Some(segments[DATE_PARTITION_DEPTH])
        } else {
            None
        }
    }

    /// The date partition the key lives under, if its partition segments
    /// parse as `year=YYYY/month=MM/day=DD`.
    pub fn date_partition(&self, prefix: &str) -> Option<DatePartition> {
        let mut segments = self.segments_after(prefix)?;
        let year = parse_partition_segment(segments.next()?, "year=")?;
        let month = parse_partition_segment(segments.next()?, "month=")?;
        let day = parse_partition_segment(segments.next()?, "day=")?;
        Some(DatePartition {
            year: year as i32,
            month,
            day,
        })
    }

    /// Whether this key names a JSON object.
    pub fn is_json(&self) -> bool {
        self.file_name().ends_with(".json")
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_partition_segment(segment: &str, tag: &str) -> Option<u32> {
    segment.strip_prefix(tag)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const PREFIX: &str = "reports/e2e";

    #[test_case(
        "reports/e2e/year=2025/month=05/day=16/pull-request/run-123.json",
        Some("pull-request");
        "full depth"
    )]
    #[test_case(
        "reports/e2e/year=2025/month=05/day=16/merge-queue/nightly/run-9.json",
        Some("merge-queue");
        "extra segments after trigger"
    )]
    #[test_case(
        "reports/e2e/year=2025/month=05/day=16/run-123.json",
        None;
        "filename directly under date partition"
    )]
    #[test_case("reports/e2e/year=2025/month=05/run-123.json", None; "short key")]
    #[test_case("reports/e2e/run-123.json", None; "no partition at all")]
    #[test_case("elsewhere/year=2025/month=05/day=16/ci/run-123.json", None; "outside prefix")]
    fn trigger_resolution(key: &str, expected: Option<&str>) {
        assert_eq!(StoreKey::new(key).trigger(PREFIX), expected);
    }

    #[test_case("a/b/run-5.json", "run-5"; "json extension stripped")]
    #[test_case("a/b/run-5", "run-5"; "no extension")]
    #[test_case("run-5.json", "run-5"; "bare filename")]
    #[test_case("a/b/2025-05-16T16-58.run.json", "2025-05-16T16-58.run"; "only last extension stripped")]
    fn run_id_resolution(key: &str, expected: &str) {
        assert_eq!(StoreKey::new(key).run_id().as_str(), expected);
    }

    #[test]
    fn date_partition_parses() {
        let key = StoreKey::new("reports/e2e/year=2025/month=05/day=16/ci/run-1.json");
        assert_eq!(
            key.date_partition(PREFIX),
            Some(DatePartition {
                year: 2025,
                month: 5,
                day: 16
            })
        );
    }

    #[test]
    fn malformed_partition_yields_none() {
        let key = StoreKey::new("reports/e2e/2025/05/16/ci/run-1.json");
        assert_eq!(key.date_partition(PREFIX), None);
    }
}
