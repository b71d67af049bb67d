use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One rung of the rank ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTier {
    /// Minimum diamonds required to hold this rank.
    pub min_sp: u64,
    pub title: String,
    pub description: String,
}

impl RankTier {
    pub fn new(min_sp: u64, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            min_sp,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Rank thresholds sorted by `min_sp` descending.
///
/// Lookup is a linear scan; the ladder is small and static.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankTable {
    tiers: Vec<RankTier>,
}

impl RankTable {
    /// Build a table from tiers in any order. Thresholds must be distinct.
    pub fn new(mut tiers: Vec<RankTier>) -> Result<Self, LedgerError> {
        let mut seen = BTreeSet::new();
        for tier in &tiers {
            if !seen.insert(tier.min_sp) {
                return Err(LedgerError::Configuration(format!(
                    "duplicate rank threshold {}",
                    tier.min_sp
                )));
            }
        }
        tiers.sort_by(|a, b| b.min_sp.cmp(&a.min_sp));
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[RankTier] {
        &self.tiers
    }

    /// Fails unless the ladder ends in a zero-threshold floor.
    pub fn validate(&self) -> Result<(), LedgerError> {
        match self.tiers.last() {
            Some(floor) if floor.min_sp == 0 => Ok(()),
            _ => Err(LedgerError::Configuration(
                "rank table has no zero-threshold floor entry".to_string(),
            )),
        }
    }

    /// Highest tier whose threshold is at or below `sp_points`.
    pub fn resolve(&self, sp_points: u64) -> Result<&RankTier, LedgerError> {
        self.tiers
            .iter()
            .find(|tier| tier.min_sp <= sp_points)
            .ok_or_else(|| {
                LedgerError::Configuration(format!(
                    "no rank tier covers {sp_points} diamonds"
                ))
            })
    }

    /// Zero-based ladder position of the resolved tier, floor = 0.
    pub fn level(&self, sp_points: u64) -> Result<usize, LedgerError> {
        let index = self
            .tiers
            .iter()
            .position(|tier| tier.min_sp <= sp_points)
            .ok_or_else(|| {
                LedgerError::Configuration(format!(
                    "no rank tier covers {sp_points} diamonds"
                ))
            })?;
        Ok(self.tiers.len() - 1 - index)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                RankTier::new(16500, "Code Wizard 🧙", "Ultimate mastery of the craft"),
                RankTier::new(14000, "Software Master 🏆", "Top tier across every layer"),
                RankTier::new(12000, "System Architect 🏗️", "Designs high-level systems"),
                RankTier::new(10000, "Senior Specialist 🌟", "Recognized expert"),
                RankTier::new(8000, "Refactor Engineer 🛠️", "Raises code quality everywhere"),
                RankTier::new(6000, "Domain Specialist 🖥️", "Deep subject knowledge"),
                RankTier::new(4500, "Senior Developer ✨", "Works autonomously"),
                RankTier::new(3000, "Associate Software Engineer 💡", "Independent contributor"),
                RankTier::new(1800, "Full Stack Dev 🌐", "Comprehensive across the stack"),
                RankTier::new(900, "Developer 💾", "Solid, consistent output"),
                RankTier::new(400, "Junior Developer 💻", "First official role"),
                RankTier::new(150, "Front End Dev 🎨", "Initial hands-on work"),
                RankTier::new(50, "Trainee Coder 🌱", "Learning the fundamentals"),
                RankTier::new(0, "Aspiring 🚀", "Every ladder starts here"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resolves_exact_thresholds_and_gaps() {
        let table = RankTable::default();
        assert_eq!(table.resolve(0).unwrap().title, "Aspiring 🚀");
        assert_eq!(table.resolve(49).unwrap().title, "Aspiring 🚀");
        assert_eq!(table.resolve(50).unwrap().title, "Trainee Coder 🌱");
        assert_eq!(table.resolve(16499).unwrap().title, "Software Master 🏆");
        assert_eq!(table.resolve(u64::MAX).unwrap().title, "Code Wizard 🧙");
    }

    #[test]
    fn default_table_is_sorted_with_floor() {
        let table = RankTable::default();
        table.validate().unwrap();
        assert!(table
            .tiers()
            .windows(2)
            .all(|pair| pair[0].min_sp > pair[1].min_sp));
    }

    #[test]
    fn table_without_floor_fails_with_configuration_error() {
        let table = RankTable::new(vec![
            RankTier::new(100, "Veteran", "has 100"),
            RankTier::new(10, "Rookie", "has 10"),
        ])
        .unwrap();

        assert!(matches!(table.validate(), Err(LedgerError::Configuration(_))));
        assert!(matches!(table.resolve(5), Err(LedgerError::Configuration(_))));
        assert_eq!(table.resolve(10).unwrap().title, "Rookie");
    }

    #[test]
    fn new_sorts_and_rejects_duplicates() {
        let table = RankTable::new(vec![
            RankTier::new(0, "Floor", ""),
            RankTier::new(20, "Top", ""),
            RankTier::new(10, "Middle", ""),
        ])
        .unwrap();
        let order: Vec<u64> = table.tiers().iter().map(|tier| tier.min_sp).collect();
        assert_eq!(order, vec![20, 10, 0]);

        let err = RankTable::new(vec![RankTier::new(0, "A", ""), RankTier::new(0, "B", "")])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    proptest! {
        #[test]
        fn resolved_tier_is_largest_threshold_not_above_input(sp in 0u64..40_000) {
            let table = RankTable::default();
            let tier = table.resolve(sp).unwrap();
            prop_assert!(tier.min_sp <= sp);
            prop_assert!(table
                .tiers()
                .iter()
                .filter(|candidate| candidate.min_sp <= sp)
                .all(|candidate| candidate.min_sp <= tier.min_sp));
        }

        #[test]
        fn rank_level_never_decreases_as_diamonds_grow(a in 0u64..40_000, b in 0u64..40_000) {
            let table = RankTable::default();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(table.level(low).unwrap() <= table.level(high).unwrap());
        }
    }
}
