//! Bounded per-device reading history

use crate::models::Reading;
use std::collections::VecDeque;

/// Ring buffer of one device's most recent readings, oldest first
#[derive(Debug, Clone)]
pub struct DeviceHistory {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl DeviceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest once full
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Contiguous time-ascending view for feature derivation
    pub fn as_slice(&mut self) -> &[Reading] {
        self.readings.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}
