// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line interface to the flaketrack flakiness leaderboard.

mod dispatch;
mod output;

pub use dispatch::FlaketrackApp;
pub use output::init_logging;
