//! Bounded detection history.
//!
//! A FIFO of `DetectionEvent`s capped at a per-instance capacity. Appends are
//! O(1) amortized; once the cap is exceeded the oldest entries are evicted.
//! The history exists only for summary statistics, not for replay or audit.

use std::collections::VecDeque;

use chrono::{DateTime, Local, Timelike};
use serde::Serialize;

use crate::detect::{DetectionEvent, EventKind};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const HOURS_PER_DAY: usize = 24;

/// Summary over the current history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_detections: u64,
    pub motion_events: u64,
    pub vehicle_count: u64,
    pub person_count: u64,
    /// Events per local hour of day (index 0 = 00:00-00:59).
    pub hourly_activity: [u64; HOURS_PER_DAY],
    pub last_detection: Option<DateTime<Local>>,
}

impl HistoryStats {
    pub fn count(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Motion => self.motion_events,
            EventKind::Vehicle => self.vehicle_count,
            EventKind::Person => self.person_count,
        }
    }

    /// Hour of day with the most events (earliest hour wins ties).
    pub fn busiest_hour(&self) -> Option<u32> {
        let (hour, count) = self
            .hourly_activity
            .iter()
            .enumerate()
            .fold((0usize, 0u64), |best, (hour, &count)| {
                if count > best.1 {
                    (hour, count)
                } else {
                    best
                }
            });
        (count > 0).then_some(hour as u32)
    }
}

#[derive(Clone, Debug)]
pub struct DetectionHistory {
    events: VecDeque<DetectionEvent>,
    capacity: usize,
}

impl DetectionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append events in arrival order, then evict from the front down to
    /// capacity. Returns how many entries were evicted.
    pub fn record<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = DetectionEvent>,
    {
        self.events.extend(events);
        let mut evicted = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!("detection history evicted {} oldest entries", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DetectionEvent> + ExactSizeIterator {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&DetectionEvent> {
        self.events.back()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Single pass over the history; does not mutate it.
    pub fn statistics(&self) -> HistoryStats {
        let mut stats = HistoryStats::default();
        for event in &self.events {
            stats.total_detections += 1;
            match event.kind() {
                EventKind::Motion => stats.motion_events += 1,
                EventKind::Vehicle => stats.vehicle_count += 1,
                EventKind::Person => stats.person_count += 1,
            }
            stats.hourly_activity[event.timestamp().hour() as usize] += 1;
        }
        stats.last_detection = self.events.back().map(DetectionEvent::timestamp);
        stats
    }
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
