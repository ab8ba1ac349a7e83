use serde::Serialize;

use crate::config::ConfigAlerting;

/// Severity of the activity seen during one evaluation cycle
#[derive(Debug, PartialEq, Eq, Serialize, Clone, Copy, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Tier {
    None,
    Low,
    High,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Thresholds {
    pub min_confidence: f32,
    pub high_count: usize,
    pub low_count: usize,
}

impl From<&ConfigAlerting> for Thresholds {
    fn from(c: &ConfigAlerting) -> Self {
        Self {
            min_confidence: c.min_confidence,
            high_count: c.high_count,
            low_count: c.low_count,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        (&ConfigAlerting::default()).into()
    }
}

impl Tier {
    /// HIGH needs enough events and every one of them confident; LOW only needs the count.
    /// An empty cycle is always NONE.
    pub fn classify(confidences: &[f32], thresholds: &Thresholds) -> Tier {
        let count = confidences.len();
        if count == 0 {
            return Tier::None;
        }
        if count >= thresholds.high_count
            && confidences.iter().all(|c| *c >= thresholds.min_confidence)
        {
            Tier::High
        } else if count >= thresholds.low_count {
            Tier::Low
        } else {
            Tier::None
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Thresholds, Tier};

    fn classify(confidences: &[f32]) -> Tier {
        Tier::classify(confidences, &Thresholds::default())
    }

    #[test]
    fn test_five_confident_events_are_high() {
        assert_eq!(classify(&[0.6, 0.6, 0.6, 0.6, 0.6]), Tier::High);
    }

    #[test]
    fn test_weak_pair_is_low() {
        assert_eq!(classify(&[0.6, 0.2]), Tier::Low);
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(classify(&[]), Tier::None);
    }

    #[test]
    fn test_one_weak_event_blocks_high() {
        assert_eq!(classify(&[0.6, 0.6, 0.6, 0.6, 0.6, 0.3]), Tier::Low);
    }

    #[test]
    fn test_single_event_is_none() {
        assert_eq!(classify(&[0.99]), Tier::None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(classify(&[0.5, 0.5, 0.5, 0.5, 0.5]), Tier::High);
    }

    #[test]
    fn test_empty_is_none_even_with_zero_counts() {
        let thresholds = Thresholds {
            min_confidence: 0.0,
            high_count: 0,
            low_count: 0,
        };
        assert_eq!(Tier::classify(&[], &thresholds), Tier::None);
        assert_eq!(Tier::classify(&[0.1], &thresholds), Tier::High);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tier::High.to_string(), "HIGH");
        assert_eq!(Tier::None.to_string(), "NONE");
    }
}
