//! Per-device outlier filtering
//!
//! Sensor spikes are device specific, so the interquartile fences are
//! computed separately for every device.

use crate::models::Reading;
use std::collections::{BTreeMap, HashMap};

/// Tukey fence multiplier
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Interquartile fences for one device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Fences for `values`; `None` when there are no values
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Quantile of sorted values by linear interpolation between closest ranks
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Drop readings outside their device's fences.
///
/// Returns the retained readings in their original order and the number
/// dropped.
pub fn filter_outliers(readings: Vec<Reading>) -> (Vec<Reading>, usize) {
    let mut per_device: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in &readings {
        per_device
            .entry(r.device.as_str())
            .or_default()
            .push(r.heart_rate as f64);
    }
    let bounds: HashMap<String, IqrBounds> = per_device
        .into_iter()
        .filter_map(|(device, values)| {
            IqrBounds::from_values(&values).map(|b| (device.to_string(), b))
        })
        .collect();

    let before = readings.len();
    let kept: Vec<Reading> = readings
        .into_iter()
        .filter(|r| {
            bounds
                .get(&r.device)
                .map_or(true, |b| b.contains(r.heart_rate as f64))
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Group readings by device, each group sorted by timestamp.
///
/// Sorting is stable, so readings sharing a timestamp keep file order.
pub fn group_by_device(readings: Vec<Reading>) -> BTreeMap<String, Vec<Reading>> {
    let mut groups: BTreeMap<String, Vec<Reading>> = BTreeMap::new();
    for r in readings {
        groups.entry(r.device.clone()).or_default().push(r);
    }
    for series in groups.values_mut() {
        series.sort_by_key(|r| r.timestamp);
    }
    groups
}
