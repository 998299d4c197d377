//! Integrity scoring
//!
//! Maps report percentages through an ordered deduction table into a 0-100
//! score. Each category applies only its first matching tier.

use serde::{Deserialize, Serialize};

use crate::report::ReportStatistics;

/// Behavioral category a deduction rule reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    LookingAway,
    MobileDevice,
    MultiplePeople,
    NoFace,
}

impl ScoreCategory {
    fn percentage(&self, stats: &ReportStatistics) -> f64 {
        match self {
            ScoreCategory::LookingAway => stats.looking_away_percentage,
            ScoreCategory::MobileDevice => stats.mobile_detection_percentage,
            ScoreCategory::MultiplePeople => stats.multiple_people_percentage,
            ScoreCategory::NoFace => stats.no_face_percentage,
        }
    }
}

/// One tier: if `pct > above`, deduct `min(cap, trunc(pct * multiplier / divisor))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionTier {
    pub above: f64,
    pub cap: i32,
    #[serde(default = "one")]
    pub multiplier: f64,
    #[serde(default = "one")]
    pub divisor: f64,
}

fn one() -> f64 {
    1.0
}

impl DeductionTier {
    pub fn new(above: f64, cap: i32, multiplier: f64, divisor: f64) -> Self {
        Self {
            above,
            cap,
            multiplier,
            divisor,
        }
    }

    fn points(&self, pct: f64) -> i32 {
        ((pct * self.multiplier / self.divisor) as i32).min(self.cap)
    }
}

/// Tiers for one category, checked in order; the first match wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionRule {
    pub category: ScoreCategory,
    pub tiers: Vec<DeductionTier>,
}

impl DeductionRule {
    fn apply(&self, pct: f64) -> i32 {
        self.tiers
            .iter()
            .find(|tier| pct > tier.above)
            .map(|tier| tier.points(pct))
            .unwrap_or(0)
    }
}

/// The full deduction/bonus table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub base: i32,
    pub rules: Vec<DeductionRule>,
    /// Face-detection rate (percent) that earns the bonus
    pub bonus_face_rate_above: f64,
    pub bonus: i32,
}

impl Default for ScoringRules {
    /// The standard deduction table.
    ///
    /// The no-face tiers are checked `> 15` before `> 30`, so the second tier
    /// never fires. Override through config to change the order.
    fn default() -> Self {
        Self {
            base: 100,
            rules: vec![
                DeductionRule {
                    category: ScoreCategory::LookingAway,
                    tiers: vec![
                        DeductionTier::new(20.0, 30, 1.0, 1.0),
                        DeductionTier::new(10.0, 15, 1.0, 2.0),
                    ],
                },
                DeductionRule {
                    category: ScoreCategory::MobileDevice,
                    tiers: vec![
                        DeductionTier::new(5.0, 25, 2.0, 1.0),
                        DeductionTier::new(2.0, 10, 1.0, 1.0),
                    ],
                },
                DeductionRule {
                    category: ScoreCategory::MultiplePeople,
                    tiers: vec![DeductionTier::new(2.0, 20, 5.0, 1.0)],
                },
                DeductionRule {
                    category: ScoreCategory::NoFace,
                    tiers: vec![
                        DeductionTier::new(15.0, 15, 1.0, 2.0),
                        DeductionTier::new(30.0, 25, 1.0, 3.0),
                    ],
                },
            ],
            bonus_face_rate_above: 90.0,
            bonus: 5,
        }
    }
}

/// Points taken for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub category: ScoreCategory,
    pub percentage: f64,
    pub points: i32,
}

/// How a score was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: i32,
    pub deductions: Vec<Deduction>,
    pub bonus: i32,
    pub score: u8,
}

impl ScoringRules {
    /// Score clamped to [0, 100]
    pub fn score(&self, stats: &ReportStatistics, face_detection_rate: f64) -> u8 {
        self.breakdown(stats, face_detection_rate).score
    }

    pub fn breakdown(&self, stats: &ReportStatistics, face_detection_rate: f64) -> ScoreBreakdown {
        let deductions: Vec<Deduction> = self
            .rules
            .iter()
            .map(|rule| {
                let percentage = rule.category.percentage(stats);
                Deduction {
                    category: rule.category,
                    percentage,
                    points: rule.apply(percentage),
                }
            })
            .collect();

        let bonus = if face_detection_rate > self.bonus_face_rate_above {
            self.bonus
        } else {
            0
        };

        let raw = self.base - deductions.iter().map(|d| d.points).sum::<i32>() + bonus;

        ScoreBreakdown {
            base: self.base,
            deductions,
            bonus,
            score: raw.clamp(0, 100) as u8,
        }
    }
}

/// Coarse reading of an integrity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityBand {
    Excellent,
    Good,
    RequiresReview,
}

impl IntegrityBand {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            IntegrityBand::Excellent
        } else if score >= 60 {
            IntegrityBand::Good
        } else {
            IntegrityBand::RequiresReview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(looking_away: f64, mobile: f64, multiple: f64, no_face: f64) -> ReportStatistics {
        ReportStatistics {
            looking_away_percentage: looking_away,
            mobile_detection_percentage: mobile,
            multiple_people_percentage: multiple,
            no_face_percentage: no_face,
        }
    }

    #[test]
    fn test_clean_session_gets_bonus_capped() {
        let rules = ScoringRules::default();
        assert_eq!(rules.score(&stats(0.0, 0.0, 0.0, 0.0), 100.0), 100);
    }

    #[test]
    fn test_looking_away_tier_one() {
        let rules = ScoringRules::default();
        let breakdown = rules.breakdown(&stats(25.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(breakdown.deductions[0].points, 25);
        assert_eq!(breakdown.score, 75);
    }

    #[test]
    fn test_looking_away_tier_two_halves() {
        let rules = ScoringRules::default();
        // int(15 / 2) = 7
        assert_eq!(rules.score(&stats(15.0, 0.0, 0.0, 0.0), 0.0), 93);
        // exactly 10 matches no tier
        assert_eq!(rules.score(&stats(10.0, 0.0, 0.0, 0.0), 0.0), 100);
    }

    #[test]
    fn test_mobile_tiers() {
        let rules = ScoringRules::default();
        assert_eq!(rules.score(&stats(0.0, 3.5, 0.0, 0.0), 0.0), 97);
        assert_eq!(rules.score(&stats(0.0, 8.0, 0.0, 0.0), 0.0), 84);
        assert_eq!(rules.score(&stats(0.0, 40.0, 0.0, 0.0), 0.0), 75);
    }

    #[test]
    fn test_multiple_people_tier() {
        let rules = ScoringRules::default();
        assert_eq!(rules.score(&stats(0.0, 0.0, 3.0, 0.0), 0.0), 85);
        assert_eq!(rules.score(&stats(0.0, 0.0, 2.0, 0.0), 0.0), 100);
    }

    #[test]
    fn test_no_face_second_tier_unreachable() {
        let rules = ScoringRules::default();
        // 45% matches "> 15" first: min(15, int(22.5)) = 15, not min(25, 15)
        let breakdown = rules.breakdown(&stats(0.0, 0.0, 0.0, 45.0), 0.0);
        assert_eq!(breakdown.deductions[3].points, 15);
        assert_eq!(breakdown.score, 85);

        assert_eq!(rules.score(&stats(0.0, 0.0, 0.0, 20.0), 0.0), 90);
    }

    #[test]
    fn test_reordered_no_face_tiers() {
        let mut rules = ScoringRules::default();
        rules.rules[3].tiers.reverse();
        assert_eq!(rules.score(&stats(0.0, 0.0, 0.0, 90.0), 0.0), 75);
    }

    #[test]
    fn test_score_bounds() {
        let rules = ScoringRules::default();
        let grid = [0.0, 1.0, 2.5, 5.0, 10.5, 15.0, 20.0, 30.0, 45.0, 60.0, 100.0];
        for &a in &grid {
            for &m in &grid {
                for &p in &grid {
                    for &n in &grid {
                        for rate in [0.0, 50.0, 90.0, 91.0, 100.0] {
                            assert!(rules.score(&stats(a, m, p, n), rate) <= 100);
                        }
                    }
                }
            }
        }
        assert_eq!(rules.score(&stats(100.0, 100.0, 100.0, 100.0), 0.0), 10);
    }

    #[test]
    fn test_clamp_low_and_high() {
        let harsh = ScoringRules {
            base: 20,
            ..Default::default()
        };
        assert_eq!(harsh.score(&stats(100.0, 100.0, 100.0, 100.0), 0.0), 0);

        let generous = ScoringRules {
            base: 130,
            ..Default::default()
        };
        assert_eq!(generous.score(&stats(0.0, 0.0, 0.0, 0.0), 100.0), 100);
    }

    #[test]
    fn test_bands() {
        assert_eq!(IntegrityBand::from_score(100), IntegrityBand::Excellent);
        assert_eq!(IntegrityBand::from_score(80), IntegrityBand::Excellent);
        assert_eq!(IntegrityBand::from_score(79), IntegrityBand::Good);
        assert_eq!(IntegrityBand::from_score(60), IntegrityBand::Good);
        assert_eq!(IntegrityBand::from_score(59), IntegrityBand::RequiresReview);
    }

    #[test]
    fn test_rules_json_roundtrip() {
        let rules = ScoringRules::default();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed: ScoringRules = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rules);
    }
}
