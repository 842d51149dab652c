// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model for the raw report payloads flaketrack ingests.
//!
//! CI runs upload one JSON report per invocation to the object store. Two
//! incompatible shapes are in circulation:
//!
//! * a nested suite → spec → test → result tree, as emitted by the runner's
//!   built-in JSON reporter ([`NestedReport`]);
//! * a flattened test list produced by older upload scripts
//!   ([`FlatReport`]).
//!
//! [`RawReport`] reconciles the two at the deserialization boundary: the
//! variant is selected once per payload by a structural check (presence of a
//! `suites` field vs. a `tests` field), and each variant has its own total
//! mapping into the canonical model in `flaketrack-core`.
//!
//! This crate only describes the wire format; it performs no normalization
//! of its own.

mod report;

pub use report::*;
