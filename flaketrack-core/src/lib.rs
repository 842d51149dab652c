// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core logic for flaketrack: turning raw per-run test reports into a ranked
//! flakiness leaderboard.
//!
//! The pipeline, leaves first:
//!
//! 1. [`key`] resolves run identity and the triggering context from an
//!    object-store key's path structure.
//! 2. [`normalize`] converts one raw payload plus its key into a canonical
//!    [`summary::RunSummary`].
//! 3. [`aggregate`] folds a batch of run summaries into per-test rollups
//!    with failure rates, chronological histories and duration percentiles
//!    ([`percentile`]).
//! 4. [`service`] ties the stages together behind the query surface the
//!    serving layer calls, fetching payloads through a [`store::ObjectStore`]
//!    and memoizing normalized batches in a TTL-bounded [`cache`].
//!
//! Aggregation is a pure, synchronous batch computation: every call
//! re-derives its result from a fully materialized in-memory collection of
//! run summaries and performs no I/O of its own.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod errors;
pub mod key;
pub mod normalize;
pub mod percentile;
pub mod service;
pub mod store;
pub mod summary;
