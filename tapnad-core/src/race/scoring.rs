use crate::error::{Result, TapnadError};
use crate::types::Progress;
use serde::{Deserialize, Serialize};

/// Game-balance constants for turning taps into track progress.
///
/// Taps are averaged over the team's supporters so a bigger team does not
/// win just by having more tappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub units_per_tap: u64,
    pub units_per_lap: u64,
    pub laps_to_win: u64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            units_per_tap: 2,
            units_per_lap: 100,
            laps_to_win: 3,
        }
    }
}

impl ScoringRules {
    pub fn validate(&self) -> Result<()> {
        if self.units_per_tap == 0 {
            return Err(TapnadError::config("units per tap must be greater than 0"));
        }

        if self.units_per_lap == 0 {
            return Err(TapnadError::config("units per lap must be greater than 0"));
        }

        if self.laps_to_win == 0 {
            return Err(TapnadError::config("laps to win must be greater than 0"));
        }

        Ok(())
    }

    /// Position units covered by a team: `floor(taps / supporters) * units_per_tap`.
    pub fn units(&self, total_taps: u64, supporters: usize) -> u64 {
        if supporters == 0 {
            return 0;
        }
        (total_taps / supporters as u64).saturating_mul(self.units_per_tap)
    }

    pub fn progress(&self, total_taps: u64, supporters: usize) -> Progress {
        let units = self.units(total_taps, supporters);
        Progress {
            lap: units / self.units_per_lap,
            position: units % self.units_per_lap,
        }
    }

    pub fn has_finished(&self, total_taps: u64, supporters: usize) -> bool {
        self.progress(total_taps, supporters).lap >= self.laps_to_win
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_supporter_boundary() {
        let rules = ScoringRules::default();

        assert_eq!(rules.progress(149, 1), Progress { lap: 2, position: 98 });
        assert!(!rules.has_finished(149, 1));
        assert_eq!(rules.progress(150, 1), Progress { lap: 3, position: 0 });
        assert!(rules.has_finished(150, 1));
    }

    #[test]
    fn test_taps_are_averaged_over_supporters() {
        let rules = ScoringRules::default();

        // floor(299 / 2) = 149 -> 298 units
        assert_eq!(rules.progress(299, 2), Progress { lap: 2, position: 98 });
        assert!(rules.has_finished(300, 2));
        assert_eq!(rules.progress(10, 0), Progress::default());
    }

    #[test]
    fn test_custom_rules() {
        let rules = ScoringRules {
            units_per_tap: 5,
            units_per_lap: 50,
            laps_to_win: 1,
        };

        assert!(!rules.has_finished(9, 1));
        assert!(rules.has_finished(10, 1));
        assert!(rules.validate().is_ok());

        let broken = ScoringRules {
            units_per_lap: 0,
            ..rules
        };
        assert!(broken.validate().is_err());
    }
}
