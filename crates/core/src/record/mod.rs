//! Timestamped snapshots and the ordered list that holds them.

use serde::{Deserialize, Serialize};

mod list;

pub use list::{Iter, RecordHandle, RecordList};

/// One snapshot of a tracked object's properties.
///
/// `values` follows the declaration order of the owning track's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub time: f64,
    pub values: Vec<f64>,
}

impl Record {
    pub fn new(time: f64, values: Vec<f64>) -> Self {
        Self { time, values }
    }
}
