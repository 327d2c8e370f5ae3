//! Segment merging.
//!
//! Input segments are short slivers cut wherever any road object boundary
//! falls. This module reassembles them into maximal runs: chains of
//! geometrically adjacent segments sharing a grouping key and an identical
//! resolved attribute set, walked in meter order. A run breaks where the
//! attributes change, where the chain is geometrically discontinuous, or
//! where the junction between two segments turns sharper than the
//! configured angle.
//!
//! Groups are iterated through a BTreeMap so output order is a pure
//! function of input content.

use std::collections::BTreeMap;

use geo_types::Coord;

use crate::attributes::AttributeSet;
use crate::geometry::bearing_change;
use crate::models::hash_coord;
use crate::reference::{GroupKey, RefCode};

/// A segment after validation, simplification and attribute resolution,
/// ready for merging. Oneway normalization has already happened, so the
/// polyline always runs in the permitted direction of travel.
#[derive(Debug, Clone)]
pub struct PreparedSegment {
    pub polyline: Vec<Coord>,
    pub group: GroupKey,
    pub refcode: Option<RefCode>,
    pub meter_range: (f64, f64),
    pub attrs: AttributeSet,
}

/// A maximal merged run, the unit that becomes one output way.
#[derive(Debug, Clone)]
pub struct MergedRun {
    pub polyline: Vec<Coord>,
    pub group: GroupKey,
    pub refcode: Option<RefCode>,
    pub meter_range: (f64, f64),
    pub attrs: AttributeSet,
}

/// Merge prepared segments into runs. `sharp_turn_angle` is the bearing
/// deviation in degrees at or above which a junction splits the run.
pub fn merge(segments: Vec<PreparedSegment>, sharp_turn_angle: f64) -> Vec<MergedRun> {
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (idx, seg) in segments.iter().enumerate() {
        groups.entry(seg.group.clone()).or_default().push(idx);
    }

    let mut runs = Vec::new();
    for (_, mut indices) in groups {
        // Stable sort keeps input order for equal meter starts.
        indices.sort_by(|&a, &b| {
            segments[a]
                .meter_range
                .0
                .partial_cmp(&segments[b].meter_range.0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut current: Option<MergedRun> = None;
        for idx in indices {
            let seg = &segments[idx];
            match current.take() {
                None => current = Some(start_run(seg)),
                Some(mut run) => match orient(&run, seg) {
                    Some(candidate) if attachable(&run, &candidate, sharp_turn_angle) => {
                        extend_run(&mut run, candidate);
                        current = Some(run);
                    }
                    _ => {
                        runs.push(run);
                        current = Some(start_run(seg));
                    }
                },
            }
        }
        if let Some(run) = current {
            runs.push(run);
        }
    }
    runs
}

fn start_run(seg: &PreparedSegment) -> MergedRun {
    MergedRun {
        polyline: seg.polyline.clone(),
        group: seg.group.clone(),
        refcode: seg.refcode.clone(),
        meter_range: seg.meter_range,
        attrs: seg.attrs.clone(),
    }
}

/// Candidate oriented so its first coordinate coincides with the run's
/// last, if either orientation fits. Reversing a segment swaps its
/// direction-qualified attributes, so a reversed oneway never matches.
struct Oriented {
    polyline: Vec<Coord>,
    attrs: AttributeSet,
    meter_range: (f64, f64),
}

fn orient(run: &MergedRun, seg: &PreparedSegment) -> Option<Oriented> {
    let tail = run.polyline.last()?;
    let first = seg.polyline.first()?;
    let last = seg.polyline.last()?;

    if hash_coord(first) == hash_coord(tail) {
        return Some(Oriented {
            polyline: seg.polyline.clone(),
            attrs: seg.attrs.clone(),
            meter_range: seg.meter_range,
        });
    }
    if hash_coord(last) == hash_coord(tail) {
        let mut reversed = seg.polyline.clone();
        reversed.reverse();
        return Some(Oriented {
            polyline: reversed,
            attrs: seg.attrs.reversed(),
            meter_range: seg.meter_range,
        });
    }
    None
}

fn attachable(run: &MergedRun, candidate: &Oriented, sharp_turn_angle: f64) -> bool {
    if candidate.attrs != run.attrs {
        return false;
    }
    bearing_change(&run.polyline, &candidate.polyline).abs() < sharp_turn_angle
}

fn extend_run(run: &mut MergedRun, candidate: Oriented) {
    // The shared junction coordinate appears once in the run.
    run.polyline.extend(candidate.polyline.into_iter().skip(1));
    run.meter_range = (
        run.meter_range.0.min(candidate.meter_range.0),
        run.meter_range.1.max(candidate.meter_range.1),
    );
}
