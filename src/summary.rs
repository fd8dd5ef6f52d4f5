//! Band/mode breakdown of a downloaded logbook.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::FetchedQso;

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QsoSummary {
    pub total: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    /// Sorted by descending count, then name.
    pub bands: Vec<(String, usize)>,
    pub modes: Vec<(String, usize)>,
    /// Records without a usable date.
    pub undated: usize,
    pub samples: Vec<FetchedQso>,
}

impl QsoSummary {
    pub fn from_qsos(qsos: &[FetchedQso]) -> Self {
        let timestamps = qsos.iter().filter_map(|q| q.timestamp);
        Self {
            total: qsos.len(),
            earliest: timestamps.clone().min(),
            latest: timestamps.max(),
            bands: tally(qsos.iter().map(|q| q.band.as_str())),
            modes: tally(qsos.iter().map(|q| q.mode.as_str())),
            undated: qsos.iter().filter(|q| q.timestamp.is_none()).count(),
            samples: qsos.iter().take(SAMPLE_SIZE).cloned().collect(),
        }
    }
}

fn tally<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
