//! Attribute resolution.
//!
//! A segment is covered by zero or more overlapping road object records
//! from different object layers. This module collapses them into one
//! normalized attribute set with at most one effective value per
//! (kind, direction) pair. Conflicts are settled by a deterministic
//! precedence rule: higher object-type specificity wins, ties go to the
//! record with the latest validity start, remaining ties keep input
//! order. Resolution is a pure function of its inputs.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::models::{AttrValue, AttributeKind, Direction, RoadObjectRecord, Segment};

/// Direction-qualified value slot for one attribute kind.
/// A record without a direction qualifier fills both slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Directional {
    pub forward: Option<AttrValue>,
    pub backward: Option<AttrValue>,
}

impl Directional {
    /// The common value when both slots are present and equal. Records
    /// without a direction qualifier fill both slots, so undirected
    /// attributes surface here.
    pub fn common(&self) -> Option<&AttrValue> {
        match (&self.forward, &self.backward) {
            (Some(f), Some(b)) if f == b => Some(f),
            _ => None,
        }
    }
}

/// Normalized attribute set for a segment.
///
/// A kind that no record covers is absent, not defaulted; downstream tag
/// mapping applies defaults explicitly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSet {
    values: FxHashMap<AttributeKind, Directional>,
}

impl AttributeSet {
    pub fn get(&self, kind: AttributeKind) -> Option<&Directional> {
        self.values.get(&kind)
    }

    pub fn forward(&self, kind: AttributeKind) -> Option<&AttrValue> {
        self.values.get(&kind).and_then(|d| d.forward.as_ref())
    }

    pub fn backward(&self, kind: AttributeKind) -> Option<&AttrValue> {
        self.values.get(&kind).and_then(|d| d.backward.as_ref())
    }

    /// Value shared by both directions, if any
    pub fn common(&self, kind: AttributeKind) -> Option<&AttrValue> {
        self.values.get(&kind).and_then(|d| d.common())
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.values.contains_key(&kind)
    }

    pub fn insert(&mut self, kind: AttributeKind, directional: Directional) {
        self.values.insert(kind, directional);
    }

    pub fn remove(&mut self, kind: AttributeKind) -> Option<Directional> {
        self.values.remove(&kind)
    }

    /// Swap forward and backward slots for every kind. Applied when a
    /// segment's geometry is reversed during oneway normalization.
    pub fn reversed(&self) -> AttributeSet {
        let values = self
            .values
            .iter()
            .map(|(&kind, d)| {
                (
                    kind,
                    Directional {
                        forward: d.backward.clone(),
                        backward: d.forward.clone(),
                    },
                )
            })
            .collect();
        AttributeSet { values }
    }

    /// Travel in the segment's forward direction is forbidden, so the
    /// polyline must be reversed before merging.
    pub fn forward_forbidden(&self) -> bool {
        self.forward(AttributeKind::Oneway).map_or(false, |v| v.is_set())
            && !self.backward(AttributeKind::Oneway).map_or(false, |v| v.is_set())
    }

    /// Effective oneway after normalization: backward travel forbidden.
    pub fn is_oneway(&self) -> bool {
        self.backward(AttributeKind::Oneway).map_or(false, |v| v.is_set())
            && !self.forward(AttributeKind::Oneway).map_or(false, |v| v.is_set())
    }
}

/// Resolve all records covering a segment into one attribute set.
///
/// Records whose covered sub-range does not overlap the segment's meter
/// range are ignored.
pub fn resolve(segment: &Segment) -> AttributeSet {
    let mut set = AttributeSet::default();

    let mut kinds: Vec<AttributeKind> = Vec::new();
    for record in &segment.records {
        if !kinds.contains(&record.kind) {
            kinds.push(record.kind);
        }
    }

    for kind in kinds {
        let mut directional = Directional::default();
        directional.forward = pick(segment, kind, Direction::Forward).cloned();
        directional.backward = pick(segment, kind, Direction::Backward).cloned();
        if directional.forward.is_some() || directional.backward.is_some() {
            set.insert(kind, directional);
        }
    }

    set
}

/// Pick the winning value for one (kind, direction) pair.
fn pick(segment: &Segment, kind: AttributeKind, side: Direction) -> Option<&AttrValue> {
    let mut best: Option<(&RoadObjectRecord, u8)> = None;

    for record in &segment.records {
        if record.kind != kind || !applies_to(record.direction, side) {
            continue;
        }
        if !covers(record, segment.meter_range) {
            continue;
        }

        let rank = record.object_type.specificity();
        let better = match best {
            None => true,
            Some((current, current_rank)) => {
                rank > current_rank
                    || (rank == current_rank && record.valid_from > current.valid_from)
            }
        };
        if better {
            best = Some((record, rank));
        }
    }

    best.map(|(record, _)| &record.value)
}

fn applies_to(record_direction: Direction, side: Direction) -> bool {
    record_direction == Direction::Both || record_direction == side
}

fn covers(record: &RoadObjectRecord, meter_range: (f64, f64)) -> bool {
    match record.coverage {
        None => true,
        Some((from, to)) => from.max(meter_range.0) < to.min(meter_range.1),
    }
}

/// Keep only segments whose validity range overlaps the filter range.
/// Open-ended validity on either side counts as overlapping.
pub fn overlaps_dates(
    segment: &Segment,
    filter: (Option<NaiveDate>, Option<NaiveDate>),
) -> bool {
    let (filter_from, filter_to) = filter;
    let starts_in_time = match (segment.valid_from, filter_to) {
        (Some(from), Some(to)) => from <= to,
        _ => true,
    };
    let ends_in_time = match (segment.valid_to, filter_from) {
        (Some(to), Some(from)) => to >= from,
        _ => true,
    };
    starts_in_time && ends_in_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoadObjectType;
    use geo_types::{Coord, LineString};

    fn segment_with(records: Vec<RoadObjectRecord>) -> Segment {
        let geometry = LineString::from(vec![
            Coord { x: 10.0, y: 60.0 },
            Coord { x: 10.01, y: 60.0 },
        ]);
        let mut seg = Segment::new("EV6", (0.0, 100.0), geometry);
        seg.records = records;
        seg
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn specific_object_type_wins() {
        let seg = segment_with(vec![
            RoadObjectRecord::new(
                RoadObjectType::RoadNetwork,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(50),
            ),
            RoadObjectRecord::new(
                RoadObjectType::SpeedLimit,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(80),
            ),
        ]);
        let set = resolve(&seg);
        assert_eq!(set.common(AttributeKind::SpeedLimit), Some(&AttrValue::Integer(80)));
    }

    #[test]
    fn recency_breaks_specificity_tie() {
        let seg = segment_with(vec![
            RoadObjectRecord::new(
                RoadObjectType::SpeedLimit,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(70),
            )
            .valid_from(date(2015, 1, 1)),
            RoadObjectRecord::new(
                RoadObjectType::SpeedLimit,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(60),
            )
            .valid_from(date(2020, 6, 1)),
        ]);
        let set = resolve(&seg);
        assert_eq!(set.common(AttributeKind::SpeedLimit), Some(&AttrValue::Integer(60)));
    }

    #[test]
    fn equal_records_keep_input_order() {
        let seg = segment_with(vec![
            RoadObjectRecord::new(
                RoadObjectType::Pavement,
                AttributeKind::Surface,
                AttrValue::Text("asphalt".into()),
            ),
            RoadObjectRecord::new(
                RoadObjectType::Pavement,
                AttributeKind::Surface,
                AttrValue::Text("gravel".into()),
            ),
        ]);
        let set = resolve(&seg);
        assert_eq!(
            set.common(AttributeKind::Surface),
            Some(&AttrValue::Text("asphalt".into()))
        );
    }

    #[test]
    fn directional_records_keep_separate_slots() {
        let seg = segment_with(vec![
            RoadObjectRecord::new(
                RoadObjectType::SpeedLimit,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(80),
            )
            .direction(Direction::Forward),
            RoadObjectRecord::new(
                RoadObjectType::SpeedLimit,
                AttributeKind::SpeedLimit,
                AttrValue::Integer(60),
            )
            .direction(Direction::Backward),
        ]);
        let set = resolve(&seg);
        assert_eq!(set.forward(AttributeKind::SpeedLimit), Some(&AttrValue::Integer(80)));
        assert_eq!(set.backward(AttributeKind::SpeedLimit), Some(&AttrValue::Integer(60)));
        assert_eq!(set.common(AttributeKind::SpeedLimit), None);
    }

    #[test]
    fn absent_kind_stays_absent() {
        let seg = segment_with(vec![]);
        let set = resolve(&seg);
        assert!(!set.contains(AttributeKind::Surface));
    }

    #[test]
    fn record_outside_position_range_is_ignored() {
        let seg = segment_with(vec![RoadObjectRecord::new(
            RoadObjectType::Pavement,
            AttributeKind::Surface,
            AttrValue::Text("gravel".into()),
        )
        .coverage(150.0, 300.0)]);
        let set = resolve(&seg);
        assert!(!set.contains(AttributeKind::Surface));
    }

    #[test]
    fn reversed_swaps_directions() {
        let seg = segment_with(vec![RoadObjectRecord::new(
            RoadObjectType::SpeedLimit,
            AttributeKind::SpeedLimit,
            AttrValue::Integer(80),
        )
        .direction(Direction::Forward)]);
        let set = resolve(&seg).reversed();
        assert_eq!(set.forward(AttributeKind::SpeedLimit), None);
        assert_eq!(set.backward(AttributeKind::SpeedLimit), Some(&AttrValue::Integer(80)));
    }

    #[test]
    fn date_filter_overlap() {
        let mut seg = segment_with(vec![]);
        seg.valid_from = Some(date(2010, 1, 1));
        seg.valid_to = Some(date(2015, 1, 1));
        assert!(overlaps_dates(&seg, (Some(date(2012, 1, 1)), Some(date(2012, 1, 1)))));
        assert!(!overlaps_dates(&seg, (Some(date(2020, 1, 1)), None)));
        assert!(overlaps_dates(&seg, (None, None)));
    }
}
