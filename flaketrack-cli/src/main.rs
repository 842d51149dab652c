// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use flaketrack_cli::FlaketrackApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    flaketrack_cli::init_logging();

    let app = FlaketrackApp::parse();
    app.exec()
}
