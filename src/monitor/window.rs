use std::time::Duration;

use tokio::time::Instant;

/// One sighting of the monitored class on one frame
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DetectionEvent {
    pub observed_at: Instant,
    pub confidence: f32,
}

impl DetectionEvent {
    pub fn new(observed_at: Instant, confidence: f32) -> Self {
        Self {
            observed_at,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Detection events since the last evaluation, in arrival order.
/// Reset-based: the loop clears it after every cycle rather than sliding it.
#[derive(Debug, Default, Clone)]
pub struct DetectionWindow {
    events: Vec<DetectionEvent>,
}

impl DetectionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DetectionEvent) {
        self.events.push(event);
    }

    /// Confidences of events observed in `[now - interval, now]`
    pub fn confidences_within(&self, now: Instant, interval: Duration) -> Vec<f32> {
        self.events
            .iter()
            .filter(|e| {
                now.checked_duration_since(e.observed_at)
                    .map_or(false, |age| age <= interval)
            })
            .map(|e| e.confidence)
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
