// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object-store abstraction for raw report payloads.
//!
//! The core only needs two operations from a store: list the key space and
//! fetch one object's bytes. [`FsStore`] implements them over a local
//! directory laid out like the remote bucket
//! (`<prefix>/year=YYYY/month=MM/day=DD/<trigger>/<run-id>.json`);
//! [`InMemoryStore`] backs tests and demos.

use crate::{
    errors::StoreError,
    key::{DatePartition, StoreKey},
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// A listable, fetchable key space of raw report objects.
pub trait ObjectStore {
    /// Lists every key in the store, in a deterministic order.
    fn list(&self) -> Result<Vec<StoreKey>, StoreError>;

    /// Fetches one object's raw bytes.
    fn fetch(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError>;
}

/// A directory-backed store: keys are paths relative to the root.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: Utf8PathBuf,
}

impl FsStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect_keys(
        &self,
        dir: &Utf8Path,
        keys: &mut Vec<StoreKey>,
    ) -> Result<(), StoreError> {
        let entries = fs_err::read_dir(dir.as_std_path()).map_err(|error| StoreError::List {
            path: self.root.clone(),
            error,
        })?;
        for entry in entries {
            let entry = entry.map_err(|error| StoreError::List {
                path: self.root.clone(),
                error,
            })?;
            let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
                continue;
            };
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                keys.push(StoreKey::new(relative.as_str()));
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsStore {
    fn list(&self) -> Result<Vec<StoreKey>, StoreError> {
        let mut keys = Vec::new();
        let root = self.root.clone();
        self.collect_keys(&root, &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    fn fetch(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        let path = self.root.join(key.as_str());
        fs_err::read(path.as_std_path()).map_err(|error| StoreError::Read {
            key: key.as_str().to_owned(),
            error,
        })
    }
}

/// A map-backed store for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one object, replacing any previous value under the key.
    pub fn insert(&mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.insert(key.into(), bytes.into());
    }
}

impl ObjectStore for InMemoryStore {
    fn list(&self) -> Result<Vec<StoreKey>, StoreError> {
        Ok(self.objects.keys().map(StoreKey::new).collect())
    }

    fn fetch(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.objects.get(key.as_str()).cloned().ok_or_else(|| {
            StoreError::Read {
                key: key.as_str().to_owned(),
                error: std::io::Error::new(std::io::ErrorKind::NotFound, "no such object"),
            }
        })
    }
}

/// The date partitions available in a store: years descending, and for each
/// year its months descending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatePartitions {
    /// Available years, most recent first.
    pub years: Vec<i32>,
    /// Available months per year, most recent first.
    pub months_by_year: IndexMap<i32, Vec<u32>>,
}

impl DatePartitions {
    /// Derives the partition set from a listed key space.
    pub fn from_keys<'a>(
        keys: impl IntoIterator<Item = &'a StoreKey>,
        prefix: &str,
    ) -> Self {
        let mut months_by_year: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
        for key in keys {
            if let Some(DatePartition { year, month, .. }) = key.date_partition(prefix) {
                let months = months_by_year.entry(year).or_default();
                if !months.contains(&month) {
                    months.push(month);
                }
            }
        }

        let mut partitions = Self::default();
        for (year, mut months) in months_by_year.into_iter().rev() {
            months.sort_unstable_by(|a, b| b.cmp(a));
            partitions.years.push(year);
            partitions.months_by_year.insert(year, months);
        }
        partitions
    }

    /// The most recent (year, month) pair, if any partitions exist.
    pub fn most_recent(&self) -> Option<(i32, u32)> {
        let year = *self.years.first()?;
        let month = *self.months_by_year.get(&year)?.first()?;
        Some((year, month))
    }

    /// Whether any partition exists at all.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PREFIX: &str = "reports";

    fn keys(raw: &[&str]) -> Vec<StoreKey> {
        raw.iter().copied().map(StoreKey::new).collect()
    }

    #[test]
    fn partitions_sorted_descending() {
        let keys = keys(&[
            "reports/year=2024/month=11/day=02/ci/a.json",
            "reports/year=2025/month=01/day=09/ci/b.json",
            "reports/year=2025/month=03/day=15/ci/c.json",
            "reports/year=2025/month=03/day=16/ci/d.json",
            "reports/not-a-partition/e.json",
        ]);

        let partitions = DatePartitions::from_keys(&keys, PREFIX);
        assert_eq!(partitions.years, [2025, 2024]);
        assert_eq!(partitions.months_by_year[&2025], [3, 1]);
        assert_eq!(partitions.months_by_year[&2024], [11]);
        assert_eq!(partitions.most_recent(), Some((2025, 3)));
    }

    #[test]
    fn empty_key_space_has_no_partitions() {
        let partitions = DatePartitions::from_keys(&[], PREFIX);
        assert!(partitions.is_empty());
        assert_eq!(partitions.most_recent(), None);
    }

    #[test]
    fn fs_store_round_trips() {
        let dir = camino_tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports/year=2025/month=05/day=16/ci");
        fs_err::create_dir_all(nested.as_std_path()).unwrap();
        fs_err::write(
            nested.join("run-1.json").as_std_path(),
            br#"{"suites": []}"#,
        )
        .unwrap();

        let store = FsStore::new(dir.path());
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].as_str(),
            "reports/year=2025/month=05/day=16/ci/run-1.json"
        );

        let bytes = store.fetch(&listed[0]).unwrap();
        assert_eq!(bytes, br#"{"suites": []}"#);
    }

    #[test]
    fn fs_store_fetch_of_missing_key_is_a_read_error() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let err = store.fetch(&StoreKey::new("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }
}
