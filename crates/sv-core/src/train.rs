//! Event train model: unit identifiers, sorted timestamp trains and train sets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for train data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrainError {
    /// A unit identifier was empty.
    #[error("unit id cannot be empty")]
    EmptyUnitId,

    /// A train contained a timestamp before the start of the recording.
    #[error("unit {unit} has negative sample index {sample}")]
    NegativeSample { unit: UnitId, sample: i64 },
}

/// Identifier of a sorted or ground-truth unit.
///
/// Units are usually small integers, but some sorters emit string labels.
/// Integer ids order numerically and sort before string ids, so unit indices
/// are stable across formats.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitId {
    Index(u64),
    Name(String),
}

impl From<u64> for UnitId {
    fn from(value: u64) -> Self {
        Self::Index(value)
    }
}

impl FromStr for UnitId {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TrainError::EmptyUnitId);
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = s.parse() {
                return Ok(Self::Index(index));
            }
        }
        Ok(Self::Name(s.to_string()))
    }
}

impl TryFrom<String> for UnitId {
    type Error = TrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Event timestamps of a single unit, as sample indices.
///
/// The timestamps are always sorted ascending. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<i64>", into = "Vec<i64>")]
pub struct EventTrain(Vec<i64>);

impl EventTrain {
    /// Creates a train, sorting the samples.
    pub fn new(mut samples: Vec<i64>) -> Self {
        samples.sort_unstable();
        Self(samples)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<i64> {
        self.0.first().copied()
    }

    /// Returns a new train with every sample moved by `offset`.
    ///
    /// Samples saturate at the `i64` bounds, so the order is preserved.
    #[must_use]
    pub fn shifted(&self, offset: i64) -> Self {
        Self(self.0.iter().map(|t| t.saturating_add(offset)).collect())
    }
}

impl From<Vec<i64>> for EventTrain {
    fn from(samples: Vec<i64>) -> Self {
        Self::new(samples)
    }
}

impl From<EventTrain> for Vec<i64> {
    fn from(train: EventTrain) -> Self {
        train.0
    }
}

impl FromIterator<i64> for EventTrain {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The trains of every unit in one recording, keyed by unit.
///
/// Iteration follows ascending [`UnitId`] order; a unit's position in that
/// order is its index in the contingency matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainSet(BTreeMap<UnitId, EventTrain>);

impl TrainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the train of `unit`.
    pub fn insert(&mut self, unit: impl Into<UnitId>, train: impl Into<EventTrain>) {
        self.0.insert(unit.into(), train.into());
    }

    pub fn get(&self, unit: &UnitId) -> Option<&EventTrain> {
        self.0.get(unit)
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &EventTrain)> {
        self.0.iter()
    }

    /// Total number of events across all units.
    pub fn total_events(&self) -> usize {
        self.0.values().map(EventTrain::len).sum()
    }

    /// True when no unit holds any event.
    pub fn has_no_events(&self) -> bool {
        self.0.values().all(EventTrain::is_empty)
    }

    /// All events of all units, sorted by time.
    ///
    /// Each entry is `(sample, unit index)`. Equal samples keep unit order.
    pub fn pooled(&self) -> Vec<(i64, usize)> {
        let mut pooled: Vec<(i64, usize)> = self
            .0
            .values()
            .enumerate()
            .flat_map(|(unit, train)| train.as_slice().iter().map(move |&t| (t, unit)))
            .collect();
        pooled.sort_unstable();
        pooled
    }

    /// Returns a new set with every train moved by `offset`.
    #[must_use]
    pub fn shifted(&self, offset: i64) -> Self {
        if offset == 0 {
            return self.clone();
        }
        Self(
            self.0
                .iter()
                .map(|(unit, train)| (unit.clone(), train.shifted(offset)))
                .collect(),
        )
    }

    /// Returns a new set with each unit moved by its own offset.
    ///
    /// Units missing from `offsets` are left in place.
    #[must_use]
    pub fn shifted_per_unit(&self, offsets: &BTreeMap<UnitId, i64>) -> Self {
        Self(
            self.0
                .iter()
                .map(|(unit, train)| {
                    let offset = offsets.get(unit).copied().unwrap_or(0);
                    (unit.clone(), train.shifted(offset))
                })
                .collect(),
        )
    }

    /// Checks that every sample is a valid (non-negative) sample index.
    pub fn validate(&self) -> Result<(), TrainError> {
        for (unit, train) in &self.0 {
            if let Some(sample) = train.first().filter(|&t| t < 0) {
                return Err(TrainError::NegativeSample {
                    unit: unit.clone(),
                    sample,
                });
            }
        }
        Ok(())
    }
}

impl<U: Into<UnitId>, T: Into<EventTrain>> FromIterator<(U, T)> for TrainSet {
    fn from_iter<I: IntoIterator<Item = (U, T)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(unit, train)| (unit.into(), train.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a TrainSet {
    type Item = (&'a UnitId, &'a EventTrain);
    type IntoIter = std::collections::btree_map::Iter<'a, UnitId, EventTrain>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_sorts_unsorted_input() {
        let train = EventTrain::new(vec![300, 100, 200, 100]);
        assert_eq!(train.as_slice(), &[100, 100, 200, 300]);
    }

    #[test]
    fn deserialized_train_is_sorted() {
        let train: EventTrain = serde_json::from_str("[5, 3, 9]").unwrap();
        assert_eq!(train.as_slice(), &[3, 5, 9]);
    }

    #[test]
    fn unit_id_parses_digits_as_index() {
        assert_eq!("7".parse::<UnitId>().unwrap(), UnitId::Index(7));
        assert_eq!(
            "unit_a".parse::<UnitId>().unwrap(),
            UnitId::Name("unit_a".to_string())
        );
        assert_eq!("".parse::<UnitId>(), Err(TrainError::EmptyUnitId));
    }

    #[test]
    fn unit_ids_order_numerically_before_names() {
        let mut ids = vec![
            UnitId::Name("a".to_string()),
            UnitId::Index(10),
            UnitId::Index(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                UnitId::Index(2),
                UnitId::Index(10),
                UnitId::Name("a".to_string())
            ]
        );
    }

    #[test]
    fn train_set_round_trips_through_json_object() {
        let set: TrainSet = serde_json::from_str(r#"{"1": [20, 10], "0": [5]}"#).unwrap();
        let units: Vec<_> = set.units().cloned().collect();
        assert_eq!(units, vec![UnitId::Index(0), UnitId::Index(1)]);
        assert_eq!(set.get(&UnitId::Index(1)).unwrap().as_slice(), &[10, 20]);
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"0":[5],"1":[10,20]}"#
        );
    }

    #[test]
    fn pooled_events_are_time_ordered_with_unit_index() {
        let set: TrainSet = [(0_u64, vec![10, 30]), (5, vec![20, 30])]
            .into_iter()
            .collect();
        assert_eq!(set.pooled(), vec![(10, 0), (20, 1), (30, 0), (30, 1)]);
        assert_eq!(set.total_events(), 4);
    }

    #[test]
    fn shifting_returns_new_set() {
        let set: TrainSet = [(0_u64, vec![10, 20])].into_iter().collect();
        let moved = set.shifted(-3);
        assert_eq!(moved.get(&UnitId::Index(0)).unwrap().as_slice(), &[7, 17]);
        assert_eq!(set.get(&UnitId::Index(0)).unwrap().as_slice(), &[10, 20]);

        let offsets = BTreeMap::from([(UnitId::Index(0), 5)]);
        let per_unit = set.shifted_per_unit(&offsets);
        assert_eq!(
            per_unit.get(&UnitId::Index(0)).unwrap().as_slice(),
            &[15, 25]
        );
    }

    #[test]
    fn shifting_saturates_at_the_bounds() {
        let set: TrainSet = [(0_u64, vec![i64::MAX - 1, 5])].into_iter().collect();
        let moved = set.shifted(10);
        assert_eq!(
            moved.get(&UnitId::Index(0)).unwrap().as_slice(),
            &[15, i64::MAX]
        );
    }

    #[test]
    fn validate_rejects_negative_samples() {
        let set: TrainSet = [(3_u64, vec![-1, 4])].into_iter().collect();
        assert_eq!(
            set.validate(),
            Err(TrainError::NegativeSample {
                unit: UnitId::Index(3),
                sample: -1
            })
        );
    }
}
