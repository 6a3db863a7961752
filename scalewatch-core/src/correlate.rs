//! Correlation of scale events with the load timeline

use crate::event::ScaleEvent;
use chrono::{DateTime, TimeDelta, Utc};

/// A scale event with its offset from the start of the load run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatedEvent {
    pub event: ScaleEvent,
    /// Negative when the event was observed before load started
    pub elapsed: TimeDelta,
}

impl CorrelatedEvent {
    pub fn elapsed_seconds(&self) -> f64 {
        match self.elapsed.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => self.elapsed.num_milliseconds() as f64 / 1e3,
        }
    }
}

/// Offset every event from `start_time`, keeping log order. Nothing is
/// filtered out.
pub fn correlate(start_time: DateTime<Utc>, events: &[ScaleEvent]) -> Vec<CorrelatedEvent> {
    events
        .iter()
        .map(|event| CorrelatedEvent {
            event: *event,
            elapsed: event.timestamp.signed_duration_since(start_time),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_from_load_start() {
        let t0 = Utc::now();
        let events = vec![
            ScaleEvent::new(0, 1, t0 + TimeDelta::seconds(5)),
            ScaleEvent::new(1, 2, t0 + TimeDelta::seconds(12)),
        ];

        let correlated = correlate(t0, &events);
        assert_eq!(correlated[0].elapsed, TimeDelta::seconds(5));
        assert_eq!(correlated[1].elapsed, TimeDelta::seconds(12));
        assert_eq!(correlated[1].elapsed_seconds(), 12.0);
        assert_eq!(correlated[0].event, events[0]);
    }

    #[test]
    fn test_events_before_start_are_kept() {
        let t0 = Utc::now();
        let events = vec![ScaleEvent::new(2, 1, t0 - TimeDelta::milliseconds(1500))];

        let correlated = correlate(t0, &events);
        assert_eq!(correlated.len(), 1);
        assert_eq!(correlated[0].elapsed_seconds(), -1.5);
    }

    #[test]
    fn test_correlate_is_idempotent() {
        let t0 = Utc::now();
        let events = vec![
            ScaleEvent::new(0, 3, t0 + TimeDelta::seconds(20)),
            ScaleEvent::new(3, 1, t0 + TimeDelta::seconds(8)),
            ScaleEvent::new(1, 4, t0 + TimeDelta::seconds(8)),
        ];

        let first = correlate(t0, &events);
        let second = correlate(t0, &events);
        assert_eq!(first, second);
        // arrival order is preserved, not re-sorted
        assert_eq!(first[0].event.new_scale, 3);
    }

    #[test]
    fn test_empty_log() {
        assert!(correlate(Utc::now(), &[]).is_empty());
    }
}
