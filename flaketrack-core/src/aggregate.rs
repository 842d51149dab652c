// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The flakiness aggregation engine.
//!
//! [`aggregate`] consumes a batch of [`RunSummary`] values, groups per-test
//! observations by stable identity (optionally partitioned by trigger), and
//! emits one [`FlakyStat`] per group, ranked descending by failure rate.
//!
//! The accumulator is an insertion-ordered map: iteration order before the
//! final explicit sort is first-seen order, never incidental hash order, so
//! aggregating the same batch twice yields identical output.

use crate::{
    key::RunId,
    percentile::percentile,
    summary::{RunSummary, TestId, TestInstance, TestStatus},
};
use indexmap::IndexMap;
use serde::Serialize;

/// How observations are grouped into rollups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupingStrategy {
    /// One rollup per test id, pooled across all triggers.
    ById,
    /// One rollup per (test id, trigger) pair. Runs without a trigger are
    /// excluded entirely: trigger-partitioned statistics are only
    /// meaningful for runs that declare one.
    ByIdAndTrigger,
}

impl GroupingStrategy {
    /// Computes the grouping key for one instance within one run, or `None`
    /// if the instance is excluded under this strategy.
    ///
    /// This is the single place the trigger-exclusion rule lives.
    fn key_for(self, instance: &TestInstance, run: &RunSummary) -> Option<GroupKey> {
        match self {
            Self::ById => Some(GroupKey {
                id: instance.id.clone(),
                trigger: None,
            }),
            Self::ByIdAndTrigger => run.trigger.as_ref().map(|trigger| GroupKey {
                id: instance.id.clone(),
                trigger: Some(trigger.clone()),
            }),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct GroupKey {
    id: TestId,
    trigger: Option<String>,
}

/// One observation in a rollup's chronological history.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The run this observation came from.
    pub run_id: RunId,
    /// Canonical status in that run.
    pub status: TestStatus,
    /// Duration in milliseconds, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Duration distribution of one rollup's sample.
///
/// Percentiles use the linear-interpolation policy of
/// [`crate::percentile`]; p99 is clamped to the observed maximum, so
/// `min <= p50 <= p99 <= max` always holds. The mean is rounded to whole
/// milliseconds.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    /// Smallest observed duration.
    pub min: u64,
    /// Largest observed duration.
    pub max: u64,
    /// Arithmetic mean, rounded to the nearest millisecond.
    pub mean: u64,
    /// Median.
    pub p50: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// The aggregated view of one test identity across all runs in the batch.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyStat {
    /// Stable test identity.
    pub id: TestId,
    /// Title carried from the first observed instance with this identity.
    pub title: String,
    /// Project carried from the first observed instance.
    pub project: String,
    /// The partition's trigger, present only under
    /// [`GroupingStrategy::ByIdAndTrigger`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Number of runs this test was observed in.
    pub runs: u64,
    /// Number of those observations that failed.
    pub failures: u64,
    /// `failures / runs` as a fraction in `0..=1`, rounded to two decimal
    /// places.
    pub failure_rate: f64,
    /// Observations in ascending order of the owning run's start time.
    pub history: Vec<HistoryEntry>,
    /// Duration distribution; `None` when no observation carried a
    /// duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_stats: Option<DurationStats>,
}

/// Per-group accumulation state.
#[derive(Debug)]
struct TestRollup {
    title: String,
    project: String,
    runs: u64,
    failures: u64,
    history: Vec<HistoryEntry>,
    durations: Vec<u64>,
}

impl TestRollup {
    fn new(instance: &TestInstance) -> Self {
        Self {
            title: instance.title.clone(),
            project: instance.project.clone(),
            runs: 0,
            failures: 0,
            history: Vec::new(),
            durations: Vec::new(),
        }
    }

    fn observe(&mut self, run: &RunSummary, instance: &TestInstance) {
        self.runs += 1;
        if instance.status.is_failed() {
            self.failures += 1;
        }
        self.history.push(HistoryEntry {
            run_id: run.run_id.clone(),
            status: instance.status,
            duration: instance.duration,
        });
        if let Some(duration) = instance.duration {
            self.durations.push(duration);
        }
    }

    fn finish(self, key: GroupKey) -> FlakyStat {
        let failure_rate = if self.runs > 0 {
            round2(self.failures as f64 / self.runs as f64)
        } else {
            0.0
        };

        FlakyStat {
            id: key.id,
            title: self.title,
            project: self.project,
            trigger: key.trigger,
            runs: self.runs,
            failures: self.failures,
            failure_rate,
            duration_stats: duration_stats(&self.durations),
            history: self.history,
        }
    }
}

/// Aggregates a batch of run summaries into ranked flakiness statistics.
///
/// Runs are processed in ascending `started_at` order (stable: ties keep
/// input order), which is what makes each rollup's history chronological.
/// The output is sorted descending by failure rate, ties broken by absolute
/// failure count descending; beyond that the sort is stable in first-seen
/// order.
///
/// An empty batch aggregates to an empty sequence, never an error.
pub fn aggregate<'a, I>(runs: I, strategy: GroupingStrategy) -> Vec<FlakyStat>
where
    I: IntoIterator<Item = &'a RunSummary>,
{
    let mut ordered: Vec<&RunSummary> = runs.into_iter().collect();
    ordered.sort_by_key(|run| run.started_at);

    let mut rollups: IndexMap<GroupKey, TestRollup> = IndexMap::new();
    for run in ordered {
        for instance in &run.tests {
            let Some(key) = strategy.key_for(instance, run) else {
                continue;
            };
            rollups
                .entry(key)
                .or_insert_with(|| TestRollup::new(instance))
                .observe(run, instance);
        }
    }

    let mut stats: Vec<FlakyStat> = rollups
        .into_iter()
        .map(|(key, rollup)| rollup.finish(key))
        .collect();

    stats.sort_by(|a, b| {
        b.failure_rate
            .total_cmp(&a.failure_rate)
            .then_with(|| b.failures.cmp(&a.failures))
    });

    stats
}

fn duration_stats(durations: &[u64]) -> Option<DurationStats> {
    let min = *durations.iter().min()?;
    let max = *durations.iter().max()?;
    let mean = (durations.iter().sum::<u64>() as f64 / durations.len() as f64).round() as u64;
    let p50 = percentile(durations, 50.0)?;
    // Interpolation can only hit the boundary here, but the invariant
    // p99 <= max is part of the contract, so clamp.
    let p99 = percentile(durations, 99.0)?.min(max as f64);
    Some(DurationStats {
        min,
        max,
        mean,
        p50,
        p99,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 16, 12, minute, 0).unwrap()
    }

    fn instance(title: &str, project: &str, status: TestStatus, duration: Option<u64>) -> TestInstance {
        TestInstance {
            id: TestId::new(title, project),
            title: title.to_owned(),
            project: project.to_owned(),
            status,
            duration,
            stdout: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(
        run_id: &str,
        minute: u32,
        trigger: Option<&str>,
        tests: Vec<TestInstance>,
    ) -> RunSummary {
        let key = crate::key::StoreKey::new(format!("{run_id}.json"));
        RunSummary {
            run_id: key.run_id(),
            started_at: at(minute),
            trigger: trigger.map(str::to_owned),
            tests,
        }
    }

    #[test]
    fn two_run_scenario() {
        let runs = vec![
            run(
                "run-a",
                0,
                Some("ci"),
                vec![instance("T", "chrome", TestStatus::Passed, Some(100))],
            ),
            run(
                "run-b",
                5,
                Some("ci"),
                vec![instance("T", "chrome", TestStatus::Failed, Some(300))],
            ),
        ];

        let stats = aggregate(&runs, GroupingStrategy::ById);
        assert_eq!(stats.len(), 1);

        let stat = &stats[0];
        assert_eq!(stat.id.as_str(), "T|chrome");
        assert_eq!(stat.runs, 2);
        assert_eq!(stat.failures, 1);
        assert_eq!(stat.failure_rate, 0.5);
        let statuses: Vec<_> = stat.history.iter().map(|h| h.status).collect();
        assert_eq!(statuses, [TestStatus::Passed, TestStatus::Failed]);

        let durations = stat.duration_stats.as_ref().unwrap();
        assert_eq!(durations.min, 100);
        assert_eq!(durations.max, 300);
        assert_eq!(durations.mean, 200);
    }

    #[test]
    fn empty_batch_aggregates_to_nothing() {
        let empty: Vec<RunSummary> = Vec::new();
        assert!(aggregate(&empty, GroupingStrategy::ById).is_empty());
        assert!(aggregate(&empty, GroupingStrategy::ByIdAndTrigger).is_empty());
    }

    #[test]
    fn ranking_breaks_rate_ties_by_absolute_failures() {
        // X: 2 failures out of 4; Y: 5 failures out of 10. Same rate, Y has
        // more absolute failures and must rank above X.
        let mut runs = Vec::new();
        for i in 0..4 {
            let status = if i < 2 {
                TestStatus::Failed
            } else {
                TestStatus::Passed
            };
            runs.push(run(
                &format!("x-{i}"),
                i,
                None,
                vec![instance("X", "p", status, None)],
            ));
        }
        for i in 0..10 {
            let status = if i < 5 {
                TestStatus::Failed
            } else {
                TestStatus::Passed
            };
            runs.push(run(
                &format!("y-{i}"),
                10 + i,
                None,
                vec![instance("Y", "p", status, None)],
            ));
        }

        let stats = aggregate(&runs, GroupingStrategy::ById);
        assert_eq!(stats[0].id.as_str(), "Y|p");
        assert_eq!(stats[1].id.as_str(), "X|p");
        assert_eq!(stats[0].failure_rate, stats[1].failure_rate);
    }

    #[test]
    fn input_order_does_not_change_content_and_history_stays_chronological() {
        let forward = vec![
            run(
                "run-a",
                0,
                None,
                vec![instance("T", "p", TestStatus::Passed, Some(10))],
            ),
            run(
                "run-b",
                1,
                None,
                vec![instance("T", "p", TestStatus::Failed, Some(20))],
            ),
            run(
                "run-c",
                2,
                None,
                vec![instance("T", "p", TestStatus::Passed, Some(30))],
            ),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let from_forward = aggregate(&forward, GroupingStrategy::ById);
        let from_reversed = aggregate(&reversed, GroupingStrategy::ById);

        assert_eq!(from_forward.len(), from_reversed.len());
        for (a, b) in from_forward.iter().zip(&from_reversed) {
            assert_eq!(a.runs, b.runs);
            assert_eq!(a.failures, b.failures);
            assert_eq!(a.failure_rate, b.failure_rate);
            let ids_a: Vec<_> = a.history.iter().map(|h| h.run_id.as_str()).collect();
            let ids_b: Vec<_> = b.history.iter().map(|h| h.run_id.as_str()).collect();
            assert_eq!(ids_a, ids_b);
            assert_eq!(ids_a, ["run-a", "run-b", "run-c"]);
        }
    }

    #[test]
    fn aggregation_is_idempotent() {
        let runs = vec![
            run(
                "run-a",
                0,
                Some("pr"),
                vec![
                    instance("T", "p", TestStatus::Failed, Some(5)),
                    instance("U", "p", TestStatus::Passed, None),
                ],
            ),
            run(
                "run-b",
                1,
                Some("pr"),
                vec![instance("T", "p", TestStatus::Passed, Some(7))],
            ),
        ];

        let first = serde_json::to_string(&aggregate(&runs, GroupingStrategy::ById)).unwrap();
        let second = serde_json::to_string(&aggregate(&runs, GroupingStrategy::ById)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn triggerless_runs_are_excluded_only_under_trigger_partitioning() {
        let runs = vec![
            run(
                "run-a",
                0,
                None,
                vec![instance("T", "p", TestStatus::Failed, None)],
            ),
            run(
                "run-b",
                1,
                Some("pr"),
                vec![instance("T", "p", TestStatus::Passed, None)],
            ),
        ];

        let pooled = aggregate(&runs, GroupingStrategy::ById);
        assert_eq!(pooled.len(), 1);
        assert_eq!(pooled[0].runs, 2);
        assert_eq!(pooled[0].trigger, None);

        let partitioned = aggregate(&runs, GroupingStrategy::ByIdAndTrigger);
        assert_eq!(partitioned.len(), 1);
        assert_eq!(partitioned[0].runs, 1);
        assert_eq!(partitioned[0].trigger.as_deref(), Some("pr"));
    }

    #[test]
    fn trigger_partitions_are_distinct_rollups() {
        let runs = vec![
            run(
                "run-a",
                0,
                Some("pr"),
                vec![instance("T", "p", TestStatus::Failed, None)],
            ),
            run(
                "run-b",
                1,
                Some("nightly"),
                vec![instance("T", "p", TestStatus::Passed, None)],
            ),
        ];

        let mut partitioned = aggregate(&runs, GroupingStrategy::ByIdAndTrigger);
        partitioned.sort_by(|a, b| a.trigger.cmp(&b.trigger));
        assert_eq!(partitioned.len(), 2);
        assert_eq!(partitioned[0].trigger.as_deref(), Some("nightly"));
        assert_eq!(partitioned[1].trigger.as_deref(), Some("pr"));
    }

    #[test]
    fn rollup_invariants_hold() {
        let mut runs = Vec::new();
        for i in 0..7 {
            let status = if i % 3 == 0 {
                TestStatus::Failed
            } else {
                TestStatus::Passed
            };
            let duration = (i % 2 == 0).then_some(50 + i as u64 * 10);
            runs.push(run(
                &format!("run-{i}"),
                i,
                Some("ci"),
                vec![instance("T", "p", status, duration)],
            ));
        }

        for strategy in [GroupingStrategy::ById, GroupingStrategy::ByIdAndTrigger] {
            for stat in aggregate(&runs, strategy) {
                assert!(stat.failures <= stat.runs);
                assert_eq!(stat.history.len() as u64, stat.runs);
                if let Some(d) = &stat.duration_stats {
                    assert!(d.min as f64 <= d.p50);
                    assert!(d.p50 <= d.p99);
                    assert!(d.p99 <= d.max as f64);
                }
            }
        }
    }

    #[test]
    fn failure_rate_rounds_to_two_decimals() {
        let runs = vec![
            run(
                "run-a",
                0,
                None,
                vec![instance("T", "p", TestStatus::Failed, None)],
            ),
            run(
                "run-b",
                1,
                None,
                vec![instance("T", "p", TestStatus::Passed, None)],
            ),
            run(
                "run-c",
                2,
                None,
                vec![instance("T", "p", TestStatus::Passed, None)],
            ),
        ];

        let stats = aggregate(&runs, GroupingStrategy::ById);
        assert_eq!(stats[0].failure_rate, 0.33);
    }

    #[test]
    fn skipped_counts_as_a_run_but_not_a_failure() {
        let runs = vec![run(
            "run-a",
            0,
            None,
            vec![instance("T", "p", TestStatus::Skipped, None)],
        )];

        let stats = aggregate(&runs, GroupingStrategy::ById);
        assert_eq!(stats[0].runs, 1);
        assert_eq!(stats[0].failures, 0);
        assert_eq!(stats[0].failure_rate, 0.0);
        assert!(stats[0].duration_stats.is_none());
    }
}
