// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_LOGGER: Once = Once::new();

/// Initializes the tracing subscriber once. The filter comes from the
/// `FLAKETRACK_LOG` environment variable, defaulting to INFO; log output
/// goes to stderr so stdout stays machine-readable.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let filter = EnvFilter::try_from_env("FLAKETRACK_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
