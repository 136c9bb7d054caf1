//! Circular source of input records, one per iteration.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The dataset used when no feeder file is configured.
const SAMPLE_DATA: &str = include_str!("../data/restful.json");

/// An input record used to create an object.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserRecord {
    /// The name of the object.
    pub name: String,
    /// Arbitrary attributes of the object.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Hands out [`UserRecord`]s in order, wrapping around to the start once exhausted.
///
/// The feeder is cheap to clone. Clones share the same cursor, so concurrent users consume
/// records from a single sequence.
#[derive(Clone, Debug)]
pub struct Feeder {
    records: Arc<[UserRecord]>,
    cursor: Arc<AtomicUsize>,
}

impl Feeder {
    /// Creates a feeder over the given records.
    ///
    /// Fails if `records` is empty, since a circular feeder needs at least one record.
    pub fn new(records: Vec<UserRecord>) -> Result<Self> {
        anyhow::ensure!(!records.is_empty(), "feeder dataset is empty");

        Ok(Self {
            records: records.into(),
            cursor: Arc::default(),
        })
    }

    /// Creates a feeder over the built-in sample dataset.
    pub fn sample() -> Result<Self> {
        Self::from_json(SAMPLE_DATA).context("failed to parse built-in dataset")
    }

    /// Loads a JSON array of records from a file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read feeder file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("failed to parse feeder file {}", path.display()))
    }

    fn from_json(json: &str) -> Result<Self> {
        let records: Vec<UserRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    /// Returns the next record, wrapping around at the end of the dataset.
    pub fn next_record(&self) -> UserRecord {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.records.len();
        self.records[index].clone()
    }

    /// The number of distinct records in the dataset.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; an empty feeder cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
