//! Frame admission policy
//!
//! Decides which captured frames go through detection. Every captured frame
//! is counted; only one of every `frame_skip` is analyzed.

use serde::{Deserialize, Serialize};

/// Admit/skip decision for one captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// Run detection on this frame
    Admit,
    /// Count it, show stats, do nothing else
    Skip,
}

/// Sampling policy keyed on the running capture counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAdmission {
    frame_skip: u64,
}

impl FrameAdmission {
    /// A `frame_skip` of 0 is treated as 1 (admit everything)
    pub fn new(frame_skip: u64) -> Self {
        Self {
            frame_skip: frame_skip.max(1),
        }
    }

    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    /// Decide for the frame with 1-based capture number `frame_number`
    pub fn decide(&self, frame_number: u64) -> Admission {
        if frame_number % self.frame_skip == 0 {
            Admission::Admit
        } else {
            Admission::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_skip_admits_every_second_frame() {
        let policy = FrameAdmission::new(2);
        let admitted: Vec<u64> = (1..=8)
            .filter(|&n| policy.decide(n) == Admission::Admit)
            .collect();
        assert_eq!(admitted, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_skip_one_admits_all() {
        let policy = FrameAdmission::new(1);
        assert!((1..=10).all(|n| policy.decide(n) == Admission::Admit));
    }

    #[test]
    fn test_zero_skip_clamped() {
        let policy = FrameAdmission::new(0);
        assert_eq!(policy.frame_skip(), 1);
        assert_eq!(policy.decide(1), Admission::Admit);
    }

    #[test]
    fn test_exactly_one_per_window() {
        let policy = FrameAdmission::new(3);
        for window in 0..10u64 {
            let admitted = (window * 3 + 1..=window * 3 + 3)
                .filter(|&n| policy.decide(n) == Admission::Admit)
                .count();
            assert_eq!(admitted, 1);
        }
    }
}
