// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, bail};
use flaketrack_core::{
    aggregate::GroupingStrategy,
    config::StoreConfig,
    service::{FlakinessService, TestHistory, WindowReport, WindowSelection},
    store::{DatePartitions, FsStore},
    summary::TestStatus,
};
use std::io::Write;

/// Flakiness leaderboard over CI test reports.
#[derive(Debug, Parser)]
#[command(name = "flaketrack", version, about)]
pub struct FlaketrackApp {
    #[command(flatten)]
    store: StoreOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct StoreOpts {
    /// Store root directory [env: FLAKETRACK_STORE_ROOT]
    #[arg(long, global = true, value_name = "DIR")]
    store_root: Option<Utf8PathBuf>,

    /// Key prefix reports live under [env: FLAKETRACK_STORE_PREFIX]
    #[arg(long, global = true, value_name = "PREFIX")]
    store_prefix: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the ranked flakiness leaderboard for a window.
    Board {
        /// Window year; requires --month.
        #[arg(long)]
        year: Option<i32>,

        /// Window month (1-12); requires --year.
        #[arg(long)]
        month: Option<u32>,

        /// Partition statistics by trigger instead of pooling across
        /// triggers.
        #[arg(long)]
        by_trigger: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one test's chronological run history.
    History {
        /// The test identity, e.g. `opens the modal|chromium`.
        test_id: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the year/month partitions available in the store.
    Windows,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Table => "table",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

impl FlaketrackApp {
    /// Executes the parsed command.
    pub fn exec(self) -> Result<()> {
        let config = StoreConfig::resolve(self.store.store_root, self.store.store_prefix)?;
        let service = FlakinessService::new(FsStore::new(config.root), config.prefix);
        let mut out = std::io::stdout().lock();

        match self.command {
            Command::Board {
                year,
                month,
                by_trigger,
                format,
            } => {
                let selection = match (year, month) {
                    (None, None) => WindowSelection::MostRecent,
                    (Some(year), Some(month)) => WindowSelection::Explicit { year, month },
                    _ => bail!("--year and --month must be provided together"),
                };
                let strategy = if by_trigger {
                    GroupingStrategy::ByIdAndTrigger
                } else {
                    GroupingStrategy::ById
                };
                let report = service.window_report(selection, strategy)?;
                match format {
                    OutputFormat::Table => print_board(&mut out, &report)?,
                    OutputFormat::Json => print_json(&mut out, &report)?,
                }
            }
            Command::History { test_id, format } => {
                let history = service.test_history(&test_id)?;
                match format {
                    OutputFormat::Table => print_history(&mut out, &history)?,
                    OutputFormat::Json => print_json(&mut out, &history)?,
                }
            }
            Command::Windows => {
                let partitions = service.available_windows()?;
                print_windows(&mut out, &partitions)?;
            }
        }
        Ok(())
    }
}

fn print_json(out: &mut impl Write, value: &impl serde::Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_board(out: &mut impl Write, report: &WindowReport) -> Result<()> {
    writeln!(
        out,
        "window {year}-{month:02}: {runs} test identities, triggers [{triggers}]",
        year = report.year,
        month = report.month,
        runs = report.stats.len(),
        triggers = report.triggers.join(", "),
    )?;
    writeln!(
        out,
        "{:>6}  {:>5}/{:<5}  {:>8}  {:>8}  {:<20}  {}",
        "RATE", "FAIL", "RUNS", "P50", "P99", "HISTORY", "TEST"
    )?;
    for stat in &report.stats {
        let (p50, p99) = match &stat.duration_stats {
            Some(d) => (format!("{:.0}ms", d.p50), format!("{:.0}ms", d.p99)),
            None => ("-".to_owned(), "-".to_owned()),
        };
        let trigger = stat
            .trigger
            .as_ref()
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();
        writeln!(
            out,
            "{rate:>5.0}%  {fail:>5}/{runs:<5}  {p50:>8}  {p99:>8}  {history:<20}  {title} ({project}){trigger}",
            rate = stat.failure_rate * 100.0,
            fail = stat.failures,
            runs = stat.runs,
            history = history_sparkline(&stat.history),
            title = stat.title,
            project = stat.project,
        )?;
    }
    Ok(())
}

/// Compact pass/fail string, most recent last; long histories keep the
/// trailing 20 observations.
fn history_sparkline(history: &[flaketrack_core::aggregate::HistoryEntry]) -> String {
    let chars: String = history
        .iter()
        .map(|entry| match entry.status {
            TestStatus::Passed => 'P',
            TestStatus::Failed => 'F',
            TestStatus::Skipped => 'S',
        })
        .collect();
    match chars.char_indices().nth_back(19) {
        Some((idx, _)) if idx > 0 => format!("…{}", &chars[idx..]),
        _ => chars,
    }
}

fn print_history(out: &mut impl Write, history: &TestHistory) -> Result<()> {
    writeln!(out, "{} ({})", history.title, history.project)?;
    for entry in &history.history {
        let duration = entry
            .duration
            .map(|d| format!("{d}ms"))
            .unwrap_or_else(|| "-".to_owned());
        writeln!(
            out,
            "{started}  {status:<7}  {duration:>8}  {run_id}",
            started = entry.started_at.to_rfc3339(),
            status = entry.status,
            run_id = entry.run_id,
        )?;
        for line in &entry.errors {
            writeln!(out, "    error: {line}")?;
        }
    }
    Ok(())
}

fn print_windows(out: &mut impl Write, partitions: &DatePartitions) -> Result<()> {
    if partitions.is_empty() {
        writeln!(out, "no report data available")?;
        return Ok(());
    }
    for year in &partitions.years {
        let months = partitions.months_by_year[year]
            .iter()
            .map(|month| format!("{month:02}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{year}: {months}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        FlaketrackApp::command().debug_assert();
    }

    #[test]
    fn year_without_month_is_rejected() {
        let app = FlaketrackApp::try_parse_from([
            "flaketrack",
            "--store-root",
            "/nonexistent",
            "--store-prefix",
            "reports",
            "board",
            "--year",
            "2025",
        ])
        .unwrap();
        let err = app.exec().unwrap_err();
        assert!(err.to_string().contains("--year and --month"));
    }
}
