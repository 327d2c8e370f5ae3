//! NVDB road network to OSM graph conversion.
//!
//! The loader hands over raw segments, point features and restriction
//! records; [`convert_network`] turns them into a node/way/relation graph
//! for an external serializer. The pipeline is a deterministic single
//! pass: parse references, normalize geometry, resolve attributes, merge
//! segments into runs, build topology, map tags, build relations.

use geo_types::Coord;
use log::{debug, info};
use thiserror::Error;

pub mod attributes;
pub mod geometry;
pub mod merger;
pub mod models;
pub mod reference;
pub mod relations;
pub mod tag_mapper;
pub mod topology;

pub use models::{OsmGraph, PointFeature, RestrictionRecord, Segment};

use attributes::AttributeSet;
use merger::PreparedSegment;
use reference::GroupKey;

/// Tuning knobs for a conversion run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Point-reduction tolerance in meters
    pub simplify_tolerance: f64,
    /// Bearing deviation in degrees at which a junction splits a run
    pub sharp_turn_angle: f64,
    /// Junction and feature snapping tolerance in meters
    pub snap_tolerance: f64,
    /// Keep only segments whose validity overlaps this range
    pub date_filter: Option<DateFilter>,
}

#[derive(Debug, Clone, Copy)]
pub struct DateFilter {
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.2,
            sharp_turn_angle: 45.0,
            snap_tolerance: 2.0,
            date_filter: None,
        }
    }
}

/// Unrecoverable structural inconsistency. Everything recoverable is
/// counted in [`Report`] instead.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("way {way} references nonexistent node {node}")]
    MissingNode { way: i64, node: i64 },
    #[error("group {group} cannot be ordered, non-finite meter position")]
    UnorderableRun { group: String },
}

/// Per-run diagnostics accumulated instead of aborting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    /// Segments dropped for malformed geometry
    pub segments_dropped: usize,
    /// Segments excluded by the date filter
    pub segments_filtered: usize,
    /// References that fell back to an opaque grouping key
    pub unparsed_refs: usize,
    /// Merged runs too short to form a way after snapping
    pub degenerate_runs: usize,
    /// Restriction records skipped during resolution
    pub relations_skipped: usize,
    /// Point features that found no way vertex within tolerance
    pub unsnapped_features: usize,
    pub runs: usize,
    pub nodes: usize,
    pub ways: usize,
    pub relations: usize,
}

/// Run the full conversion pipeline over materialized input.
pub fn convert_network(
    segments: Vec<Segment>,
    point_features: &[PointFeature],
    restrictions: &[RestrictionRecord],
    config: &Config,
) -> Result<(OsmGraph, Report), ConvertError> {
    let mut report = Report::default();

    let prepared = prepare_segments(segments, config, &mut report)?;
    info!(
        "prepared {} segments ({} dropped, {} filtered, {} unparsed refs)",
        prepared.len(),
        report.segments_dropped,
        report.segments_filtered,
        report.unparsed_refs
    );

    let runs = merger::merge(prepared, config.sharp_turn_angle);
    report.runs = runs.len();
    info!("merged into {} runs", runs.len());

    let mut topo = topology::build_graph(&runs, config.snap_tolerance);
    report.degenerate_runs = topo.degenerate_runs;

    for (way_idx, &run_idx) in topo.way_runs.iter().enumerate() {
        topo.graph.ways[way_idx].tags = tag_mapper::way_tags(&runs[run_idx]);
    }

    let features: Vec<(Coord, models::Tags)> = point_features
        .iter()
        .map(|f| (f.coord, tag_mapper::nodes::feature_tags(&f.kind)))
        .collect();
    report.unsnapped_features = topology::attach_point_features(&mut topo, &features);

    let skipped = relations::build_relations(
        &mut topo.graph,
        restrictions,
        &topo.spans,
        &topo.junctions,
    );
    for reason in &skipped {
        debug!("restriction skipped: {:?}", reason);
    }
    report.relations_skipped = skipped.len();

    let graph = topo.graph;
    if let Err((way, node)) = graph.check_consistency() {
        return Err(ConvertError::MissingNode { way, node });
    }

    report.nodes = graph.nodes.len();
    report.ways = graph.ways.len();
    report.relations = graph.relations.len();
    info!(
        "graph complete: {} nodes, {} ways, {} relations ({} restrictions skipped)",
        report.nodes, report.ways, report.relations, report.relations_skipped
    );

    Ok((graph, report))
}

/// Validate, normalize and resolve each input segment.
fn prepare_segments(
    segments: Vec<Segment>,
    config: &Config,
    report: &mut Report,
) -> Result<Vec<PreparedSegment>, ConvertError> {
    let mut prepared = Vec::with_capacity(segments.len());

    for (idx, segment) in segments.into_iter().enumerate() {
        if !geometry::validate(&segment.geometry) {
            report.segments_dropped += 1;
            continue;
        }
        if !segment.meter_range.0.is_finite() || !segment.meter_range.1.is_finite() {
            return Err(ConvertError::UnorderableRun {
                group: segment.reference.clone(),
            });
        }
        if let Some(filter) = config.date_filter {
            if !attributes::overlaps_dates(&segment, (filter.from, filter.to)) {
                report.segments_filtered += 1;
                continue;
            }
        }

        let (group, refcode) = match reference::parse_reference(&segment.reference) {
            Some(Ok(code)) => (code.group_key(), Some(code)),
            Some(Err(key)) => {
                report.unparsed_refs += 1;
                (key, None)
            }
            // No reference at all: a singleton group of its own.
            None => (GroupKey::Opaque(format!("<no ref #{}>", idx)), None),
        };

        let mut geom = segment.geometry.clone();
        geometry::round_coords(&mut geom);
        let mut polyline = geometry::simplify_polyline(&geom.0, config.simplify_tolerance);

        let mut attrs: AttributeSet = attributes::resolve(&segment);
        if attrs.forward_forbidden() {
            // Travel only against the digitized direction: flip once here
            // so merging and tagging see a forward-running oneway.
            polyline.reverse();
            attrs = attrs.reversed();
        }

        prepared.push(PreparedSegment {
            polyline,
            group,
            refcode,
            meter_range: segment.meter_range,
            attrs,
        });
    }

    Ok(prepared)
}
