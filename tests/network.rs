//! End-to-end pipeline scenarios.

use geo_types::{Coord, LineString};

use nvdb2osm::models::{
    AttrValue, AttributeKind, PointFeature, PointKind, RestrictionKind, RestrictionRecord,
    RoadObjectRecord, RoadObjectType, Segment,
};
use nvdb2osm::{convert_network, Config, OsmGraph};

fn c(x: f64, y: f64) -> Coord {
    Coord { x, y }
}

fn segment(reference: &str, meter_range: (f64, f64), coords: Vec<Coord>) -> Segment {
    Segment::new(reference, meter_range, LineString::from(coords))
}

fn surface(value: &str) -> RoadObjectRecord {
    RoadObjectRecord::new(
        RoadObjectType::Pavement,
        AttributeKind::Surface,
        AttrValue::Text(value.to_string()),
    )
}

fn convert(segments: Vec<Segment>) -> (OsmGraph, nvdb2osm::Report) {
    convert_network(segments, &[], &[], &Config::default()).unwrap()
}

/// Three consecutive gently-curving segments with identical reference and
/// attributes become a single way spanning the whole meter range.
#[test]
fn consecutive_segments_merge_into_one_way() {
    let segments = vec![
        segment("EV6", (0.0, 100.0), vec![c(10.0, 60.0), c(10.0018, 60.0)]),
        segment(
            "EV6",
            (100.0, 250.0),
            vec![c(10.0018, 60.0), c(10.0045, 60.00002)],
        ),
        segment(
            "EV6",
            (250.0, 400.0),
            vec![c(10.0045, 60.00002), c(10.0072, 60.00005)],
        ),
    ];

    let (graph, report) = convert(segments);
    assert_eq!(report.runs, 1);
    assert_eq!(graph.ways.len(), 1);
    let way = &graph.ways[0];
    assert_eq!(way.meter_range, (0.0, 400.0));
    assert_eq!(way.nodes.len(), 4);
    assert_eq!(way.tags.get("highway").map(String::as_str), Some("trunk"));
    assert_eq!(way.tags.get("ref").map(String::as_str), Some("E 6"));
}

/// A sharp corner between otherwise identical segments splits the run.
#[test]
fn sharp_corner_splits_into_two_ways() {
    let segments = vec![
        segment("EV6", (0.0, 100.0), vec![c(10.0, 60.0), c(10.0018, 60.0)]),
        // Doubles back north-west, far past the 45 degree threshold.
        segment(
            "EV6",
            (100.0, 200.0),
            vec![c(10.0018, 60.0), c(10.001, 60.0008)],
        ),
    ];

    let (graph, _) = convert(segments);
    assert_eq!(graph.ways.len(), 2);
    // Still one shared node at the corner.
    assert_eq!(
        graph.ways[0].nodes.last(),
        graph.ways[1].nodes.first()
    );
}

/// A surface change mid-road splits the way exactly at the boundary, with
/// one shared node at the split point.
#[test]
fn surface_change_splits_at_boundary() {
    let mut first = segment("EV6", (0.0, 150.0), vec![c(10.0, 60.0), c(10.0027, 60.0)]);
    first.records.push(surface("asphalt"));
    let mut second = segment(
        "EV6",
        (150.0, 300.0),
        vec![c(10.0027, 60.0), c(10.0054, 60.0)],
    );
    second.records.push(surface("gravel"));

    let (graph, _) = convert(vec![first, second]);
    assert_eq!(graph.ways.len(), 2);
    assert_eq!(graph.ways[0].meter_range, (0.0, 150.0));
    assert_eq!(graph.ways[1].meter_range, (150.0, 300.0));
    assert_eq!(
        graph.ways[0].tags.get("surface").map(String::as_str),
        Some("asphalt")
    );
    assert_eq!(
        graph.ways[1].tags.get("surface").map(String::as_str),
        Some("gravel")
    );
    assert_eq!(graph.ways[0].nodes.last(), graph.ways[1].nodes.first());
}

/// Crossing roads share a junction node; a restriction whose via
/// coordinate is within snap tolerance resolves to it, one outside the
/// tolerance is skipped and reported.
#[test]
fn restriction_via_resolution() {
    let segments = vec![
        segment("EV6", (0.0, 100.0), vec![c(10.0, 60.0), c(10.0018, 60.0)]),
        segment(
            "RV4",
            (0.0, 100.0),
            vec![c(10.0018, 60.0), c(10.0018, 60.0009)],
        ),
    ];
    let restrictions = vec![
        RestrictionRecord {
            kind: RestrictionKind::NoLeftTurn,
            from: ("EV6".to_string(), 50.0),
            // ~0.5 m from the shared junction
            via: c(10.0018, 60.000004),
            to: ("RV4".to_string(), 50.0),
        },
        RestrictionRecord {
            kind: RestrictionKind::NoRightTurn,
            from: ("EV6".to_string(), 50.0),
            // ~50 m away
            via: c(10.0018, 60.00045),
            to: ("RV4".to_string(), 50.0),
        },
    ];

    let (graph, report) =
        convert_network(segments, &[], &restrictions, &Config::default()).unwrap();
    assert_eq!(graph.relations.len(), 1);
    assert_eq!(report.relations_skipped, 1);

    let relation = &graph.relations[0];
    assert_eq!(
        relation.tags.get("restriction").map(String::as_str),
        Some("no_left_turn")
    );
    // The via member is the shared junction node.
    let junction = *graph.ways[0].nodes.last().unwrap();
    assert_eq!(relation.members[1].id, junction);
}

/// Point features snap onto way vertices within tolerance and otherwise
/// stay free-standing for manual placement.
#[test]
fn point_features_snap_to_vertices() {
    let segments = vec![segment(
        "KV100",
        (0.0, 100.0),
        vec![c(10.0, 60.0), c(10.0018, 60.0)],
    )];
    let features = vec![
        PointFeature {
            coord: c(10.0018, 60.000004),
            kind: PointKind::Crossing {
                signal_controlled: true,
            },
        },
        PointFeature {
            coord: c(10.5, 60.5),
            kind: PointKind::Crossing {
                signal_controlled: false,
            },
        },
    ];

    let (graph, report) =
        convert_network(segments, &features, &[], &Config::default()).unwrap();
    assert_eq!(report.unsnapped_features, 1);

    let end_id = *graph.ways[0].nodes.last().unwrap();
    let end = graph.nodes.iter().find(|n| n.id == end_id).unwrap();
    assert_eq!(end.tags.get("highway").map(String::as_str), Some("crossing"));
    assert_eq!(
        end.tags.get("crossing").map(String::as_str),
        Some("traffic_signals")
    );
}

/// A sliver whose endpoints collapse within snap tolerance is dropped
/// without leaving stray nodes in the graph.
#[test]
fn degenerate_sliver_leaves_graph_empty() {
    let segments = vec![segment(
        "EV6",
        (0.0, 1.0),
        vec![c(10.0, 60.0), c(10.000005, 60.0)],
    )];

    let (graph, report) = convert(segments);
    assert_eq!(report.degenerate_runs, 1);
    assert!(graph.ways.is_empty());
    assert!(graph.nodes.is_empty());
}

/// Malformed geometry is dropped and counted, not fatal.
#[test]
fn malformed_geometry_is_dropped_and_reported() {
    let segments = vec![
        segment("EV6", (0.0, 100.0), vec![c(10.0, 60.0), c(10.0018, 60.0)]),
        segment("EV6", (100.0, 200.0), vec![c(10.0018, 60.0)]),
        segment("EV6", (200.0, 300.0), vec![c(f64::NAN, 60.0), c(10.0, 60.0)]),
    ];

    let (graph, report) = convert(segments);
    assert_eq!(report.segments_dropped, 2);
    assert_eq!(graph.ways.len(), 1);
}

fn graph_fingerprint(graph: &OsmGraph) -> Vec<String> {
    let mut lines = Vec::new();
    for node in &graph.nodes {
        let mut tags: Vec<_> = node.tags.iter().collect();
        tags.sort();
        lines.push(format!(
            "node {} {:.7} {:.7} {:?}",
            node.id, node.coord.x, node.coord.y, tags
        ));
    }
    for way in &graph.ways {
        let mut tags: Vec<_> = way.tags.iter().collect();
        tags.sort();
        lines.push(format!("way {} {:?} {:?}", way.id, way.nodes, tags));
    }
    for relation in &graph.relations {
        let members: Vec<_> = relation
            .members
            .iter()
            .map(|m| (m.id, m.role.clone()))
            .collect();
        lines.push(format!("relation {} {:?}", relation.id, members));
    }
    lines
}

/// Identical input produces an identical graph across runs.
#[test]
fn pipeline_is_idempotent() {
    let build_input = || {
        let mut first = segment("EV6", (0.0, 150.0), vec![c(10.0, 60.0), c(10.0027, 60.0)]);
        first.records.push(surface("asphalt"));
        let mut second = segment(
            "EV6",
            (150.0, 300.0),
            vec![c(10.0027, 60.0), c(10.0054, 60.0)],
        );
        second.records.push(surface("gravel"));
        let crossing = segment(
            "RV4",
            (0.0, 100.0),
            vec![c(10.0027, 60.0), c(10.0027, 60.0009)],
        );
        vec![first, second, crossing]
    };

    let (first_graph, first_report) = convert(build_input());
    let (second_graph, second_report) = convert(build_input());
    assert_eq!(first_report, second_report);
    assert_eq!(graph_fingerprint(&first_graph), graph_fingerprint(&second_graph));
}
