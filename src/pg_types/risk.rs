use serde::{Deserialize, Serialize};

use crate::error::InnerError;

/// How risky a single migration statement is for a live application.
/// Comparisons use the ordinal: `Safe < Low < Medium < High < Critical`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

pub const RISK_LEVELS: [RiskLevel; 5] = [
    RiskLevel::Safe,
    RiskLevel::Low,
    RiskLevel::Medium,
    RiskLevel::High,
    RiskLevel::Critical,
];

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Bump the level by `steps`, saturating at `Critical`.
    pub fn bump(&self, steps: u8) -> RiskLevel {
        let ix = (*self as usize + steps as usize).min(RISK_LEVELS.len() - 1);
        RISK_LEVELS[ix]
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RISK_LEVELS
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InnerError::InvalidRiskLevel(s.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ordering_follows_the_scale() {
        assert!(RiskLevel::Safe < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn bump_saturates_at_critical() {
        assert_eq!(RiskLevel::Low.bump(1), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.bump(2), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.bump(3), RiskLevel::Critical);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert_eq!("safe".parse::<RiskLevel>().unwrap(), RiskLevel::Safe);
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn round_trips_as_str() {
        for level in RISK_LEVELS {
            assert_eq!(level.as_str().parse::<RiskLevel>().unwrap(), level);
        }
    }
}
