//! Area configuration and cycle date rules.
//!
//! # Responsibility
//! - Describe the chore zones a rotation staffs.
//! - Own the frequency → end date rule shared with stored history.
//!
//! # Invariants
//! - `people_needed >= 1` and `difficulty >= 1` for every configured area.
//! - Area names are unique inside one catalog.
//! - Areas without a configured frequency rotate weekly.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Recurrence of one area. Closed set; `Weekly` is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    /// Computes the cycle end for a task starting at `start`.
    ///
    /// - weekly: +7 days
    /// - biweekly: +14 days
    /// - monthly: +1 calendar month; a day that does not exist in the target
    ///   month rolls forward (Jan 31 → Mar 2 in a 28-day February).
    ///
    /// Returns `None` only when the result leaves chrono's representable range.
    pub fn end_date_from(self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Weekly => start.checked_add_signed(Duration::days(7)),
            Self::Biweekly => start.checked_add_signed(Duration::days(14)),
            Self::Monthly => add_one_month_rolling(start),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weekly" => Some(Self::Weekly),
            "biweekly" => Some(Self::Biweekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

fn add_one_month_rolling(start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = start.date_naive();
    let (year, month) = if date.month() == 12 {
        (date.year().checked_add(1)?, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1)?;
    let shifted = first_of_month.checked_add_signed(Duration::days(i64::from(date.day() - 1)))?;
    Some(shifted.and_time(start.time()).and_utc())
}

/// One configured chore zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    #[serde(default)]
    pub frequency: Frequency,
    pub people_needed: u32,
    /// Relative effort. Higher means harder.
    pub difficulty: u32,
}

impl Area {
    pub fn new(name: impl Into<String>, difficulty: u32, people_needed: u32) -> Self {
        Self {
            name: name.into(),
            frequency: Frequency::Weekly,
            people_needed,
            difficulty,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Workload this area adds to the cycle: `difficulty * people_needed`.
    pub fn weight(&self) -> u64 {
        u64::from(self.difficulty) * u64::from(self.people_needed)
    }
}

/// Area configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaValidationError {
    EmptyCatalog,
    EmptyName,
    DuplicateName(String),
    ZeroPeopleNeeded(String),
    ZeroDifficulty(String),
}

impl Display for AreaValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCatalog => write!(f, "area catalog must contain at least one area"),
            Self::EmptyName => write!(f, "area name must not be blank"),
            Self::DuplicateName(name) => write!(f, "duplicate area name: `{name}`"),
            Self::ZeroPeopleNeeded(name) => {
                write!(f, "area `{name}` must need at least one person")
            }
            Self::ZeroDifficulty(name) => write!(f, "area `{name}` must have difficulty >= 1"),
        }
    }
}

impl Error for AreaValidationError {}

/// Ordered, static set of areas staffed by each rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaCatalog {
    areas: Vec<Area>,
}

impl AreaCatalog {
    pub fn new(areas: Vec<Area>) -> Self {
        Self { areas }
    }

    /// Household catalog used when no configuration is supplied.
    pub fn default_household() -> Self {
        Self::new(vec![
            Area::new("Cocina", 2, 1),
            Area::new("Baño Principal", 2, 1),
            Area::new("Baño de Visitas", 2, 1),
            Area::new("Living y Comedor", 3, 2),
            Area::new("Basura y Reciclaje", 1, 1),
            Area::new("Cortar el pasto", 4, 2).with_frequency(Frequency::Monthly),
            Area::new("Lavandería", 1, 1),
            Area::new("Terraza y Escaleras", 3, 2).with_frequency(Frequency::Biweekly),
        ])
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Area> {
        self.areas.iter().find(|area| area.name == name)
    }

    /// Frequency configured for `name`, weekly for unknown areas.
    pub fn frequency_of(&self, name: &str) -> Frequency {
        self.get(name)
            .map(|area| area.frequency)
            .unwrap_or_default()
    }

    /// Sum of `difficulty * people_needed` over all areas.
    pub fn total_weight(&self) -> u64 {
        self.areas.iter().map(Area::weight).sum()
    }

    /// Fair share of the cycle workload for each of `available_people`.
    ///
    /// Returns `0.0` for an empty pool instead of dividing by zero.
    pub fn target_workload(&self, available_people: usize) -> f64 {
        if available_people == 0 {
            return 0.0;
        }
        self.total_weight() as f64 / available_people as f64
    }

    /// Areas sorted hardest first. Equal difficulties keep catalog order.
    pub fn by_difficulty_desc(&self) -> Vec<&Area> {
        let mut ordered: Vec<&Area> = self.areas.iter().collect();
        ordered.sort_by(|left, right| right.difficulty.cmp(&left.difficulty));
        ordered
    }

    pub fn validate(&self) -> Result<(), AreaValidationError> {
        if self.areas.is_empty() {
            return Err(AreaValidationError::EmptyCatalog);
        }
        let mut names = BTreeSet::new();
        for area in &self.areas {
            let name = area.name.trim();
            if name.is_empty() {
                return Err(AreaValidationError::EmptyName);
            }
            if !names.insert(name.to_string()) {
                return Err(AreaValidationError::DuplicateName(name.to_string()));
            }
            if area.people_needed == 0 {
                return Err(AreaValidationError::ZeroPeopleNeeded(name.to_string()));
            }
            if area.difficulty == 0 {
                return Err(AreaValidationError::ZeroDifficulty(name.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for AreaCatalog {
    fn default() -> Self {
        Self::default_household()
    }
}

#[cfg(test)]
mod tests {
    use super::{Area, AreaCatalog, AreaValidationError, Frequency};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 9, 30, 0).unwrap()
    }

    #[test]
    fn frequency_mapping_matches_stored_history_contract() {
        let catalog = AreaCatalog::default_household();
        let start = at(2024, 1, 15);

        let end = |name: &str| catalog.frequency_of(name).end_date_from(start).unwrap();
        assert_eq!(end("Cortar el pasto"), at(2024, 2, 15));
        assert_eq!(end("Terraza y Escaleras"), at(2024, 1, 29));
        assert_eq!(end("Cocina"), at(2024, 1, 22));
        assert_eq!(end("not configured anywhere"), at(2024, 1, 22));
    }

    #[test]
    fn monthly_end_rolls_day_overflow_forward() {
        assert_eq!(
            Frequency::Monthly.end_date_from(at(2023, 1, 31)).unwrap(),
            at(2023, 3, 3)
        );
        assert_eq!(
            Frequency::Monthly.end_date_from(at(2024, 1, 31)).unwrap(),
            at(2024, 3, 2)
        );
        assert_eq!(
            Frequency::Monthly.end_date_from(at(2024, 12, 10)).unwrap(),
            at(2025, 1, 10)
        );
    }

    #[test]
    fn target_workload_for_default_household_and_four_people() {
        let catalog = AreaCatalog::default_household();
        assert_eq!(catalog.total_weight(), 28);
        assert!((catalog.target_workload(4) - 7.0).abs() < f64::EPSILON);
        assert_eq!(catalog.target_workload(0), 0.0);
    }

    #[test]
    fn difficulty_order_is_stable_for_ties() {
        let catalog = AreaCatalog::default_household();
        let names: Vec<&str> = catalog
            .by_difficulty_desc()
            .into_iter()
            .map(|area| area.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "Cortar el pasto",
                "Living y Comedor",
                "Terraza y Escaleras",
                "Cocina",
                "Baño Principal",
                "Baño de Visitas",
                "Basura y Reciclaje",
                "Lavandería",
            ]
        );
    }

    #[test]
    fn validate_rejects_duplicates_and_zero_staffing() {
        let duplicate = AreaCatalog::new(vec![Area::new("Cocina", 1, 1), Area::new("Cocina", 2, 1)]);
        assert_eq!(
            duplicate.validate(),
            Err(AreaValidationError::DuplicateName("Cocina".to_string()))
        );

        let unstaffed = AreaCatalog::new(vec![Area::new("Patio", 1, 0)]);
        assert_eq!(
            unstaffed.validate(),
            Err(AreaValidationError::ZeroPeopleNeeded("Patio".to_string()))
        );

        assert!(AreaCatalog::default_household().validate().is_ok());
    }
}
