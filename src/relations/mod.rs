//! Restriction relations.
//!
//! Each restriction record names an approach (reference + meter position),
//! a via coordinate and an exit. The from/to references resolve through
//! the way span table to the way covering the cited position, the via
//! coordinate through the junction index. Resolution failures skip the
//! individual record; they never abort the run.

use log::debug;

use crate::models::{MemberType, OsmGraph, OsmMember, OsmRelation, RestrictionRecord, Tags};
use crate::reference::{parse_reference, GroupKey};
use crate::topology::{NodeIndex, SpanLookup, WaySpanTable};

/// Why an individual restriction was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The cited position falls on a split boundary shared by two ways.
    AmbiguousPosition(String),
    /// No way covers the cited reference position.
    UnknownPosition(String),
    /// No junction node within snap tolerance of the via coordinate.
    MissingVia,
}

/// Build one relation per restriction record, appending to the graph.
/// Returns the skipped records with their reasons.
pub fn build_relations(
    graph: &mut OsmGraph,
    records: &[RestrictionRecord],
    spans: &WaySpanTable,
    junctions: &NodeIndex,
) -> Vec<SkipReason> {
    let mut skipped = Vec::new();

    for record in records {
        let from = match resolve_way(spans, &record.from) {
            Ok(id) => id,
            Err(reason) => {
                debug!("skipping restriction at {:?}: {:?}", record.from, reason);
                skipped.push(reason);
                continue;
            }
        };
        let to = match resolve_way(spans, &record.to) {
            Ok(id) => id,
            Err(reason) => {
                debug!("skipping restriction at {:?}: {:?}", record.to, reason);
                skipped.push(reason);
                continue;
            }
        };
        let Some(via) = junctions.nearest(&record.via) else {
            debug!("skipping restriction: no junction near {:?}", record.via);
            skipped.push(SkipReason::MissingVia);
            continue;
        };

        let mut tags = Tags::default();
        tags.insert("type".to_string(), "restriction".to_string());
        tags.insert("restriction".to_string(), record.kind.osm_value().to_string());

        let id = graph.next_id();
        graph.relations.push(OsmRelation {
            id,
            members: vec![
                OsmMember {
                    id: from,
                    member_type: MemberType::Way,
                    role: "from".to_string(),
                },
                OsmMember {
                    id: via,
                    member_type: MemberType::Node,
                    role: "via".to_string(),
                },
                OsmMember {
                    id: to,
                    member_type: MemberType::Way,
                    role: "to".to_string(),
                },
            ],
            tags,
        });
    }

    skipped
}

fn resolve_way(spans: &WaySpanTable, cited: &(String, f64)) -> Result<i64, SkipReason> {
    let (raw, position) = cited;
    let group = match parse_reference(raw) {
        Some(Ok(code)) => code.group_key(),
        Some(Err(key)) => key,
        None => GroupKey::Opaque(String::new()),
    };
    match spans.find(&group, *position) {
        SpanLookup::Unique(id) => Ok(id),
        SpanLookup::Ambiguous(_, _) => Err(SkipReason::AmbiguousPosition(raw.clone())),
        SpanLookup::Missing => Err(SkipReason::UnknownPosition(raw.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RestrictionKind;
    use geo_types::Coord;

    fn setup() -> (OsmGraph, WaySpanTable, NodeIndex) {
        let mut graph = OsmGraph::new();
        let junction = graph.add_node(Coord { x: 10.001, y: 60.0 });

        let mut spans = WaySpanTable::default();
        let ev6 = parse_reference("EV6").unwrap().unwrap().group_key();
        let rv4 = parse_reference("RV4").unwrap().unwrap().group_key();
        let from_way = graph.next_id();
        let to_way = graph.next_id();
        spans.insert(ev6, (0.0, 100.0), from_way);
        spans.insert(rv4, (0.0, 100.0), to_way);

        let mut junctions = NodeIndex::new(2.0);
        junctions.insert(Coord { x: 10.001, y: 60.0 }, junction);
        (graph, spans, junctions)
    }

    fn record(via: Coord) -> RestrictionRecord {
        RestrictionRecord {
            kind: RestrictionKind::NoLeftTurn,
            from: ("EV6".to_string(), 50.0),
            via,
            to: ("RV4".to_string(), 50.0),
        }
    }

    #[test]
    fn restriction_resolves_to_ways_and_junction_node() {
        let (mut graph, spans, junctions) = setup();
        // Via coordinate ~0.5 m from the junction node.
        let skipped = build_relations(
            &mut graph,
            &[record(Coord { x: 10.001, y: 60.000004 })],
            &spans,
            &junctions,
        );
        assert!(skipped.is_empty());
        assert_eq!(graph.relations.len(), 1);
        let relation = &graph.relations[0];
        assert_eq!(relation.tags.get("type").map(String::as_str), Some("restriction"));
        assert_eq!(
            relation.tags.get("restriction").map(String::as_str),
            Some("no_left_turn")
        );
        let roles: Vec<&str> = relation.members.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["from", "via", "to"]);
        assert_eq!(relation.members[1].member_type, MemberType::Node);
    }

    #[test]
    fn distant_via_coordinate_skips_record() {
        let (mut graph, spans, junctions) = setup();
        // ~50 m away, outside the 2 m tolerance.
        let skipped = build_relations(
            &mut graph,
            &[record(Coord { x: 10.001, y: 60.00045 })],
            &spans,
            &junctions,
        );
        assert_eq!(skipped, vec![SkipReason::MissingVia]);
        assert!(graph.relations.is_empty());
    }

    #[test]
    fn position_on_split_boundary_is_ambiguous() {
        let (mut graph, mut spans, junctions) = setup();
        let ev6 = parse_reference("EV6").unwrap().unwrap().group_key();
        let second = graph.next_id();
        spans.insert(ev6, (100.0, 200.0), second);

        let mut rec = record(Coord { x: 10.001, y: 60.0 });
        rec.from.1 = 100.0;
        let skipped = build_relations(&mut graph, &[rec], &spans, &junctions);
        assert_eq!(skipped, vec![SkipReason::AmbiguousPosition("EV6".to_string())]);
        assert!(graph.relations.is_empty());
    }

    #[test]
    fn unknown_reference_skips_record() {
        let (mut graph, spans, junctions) = setup();
        let mut rec = record(Coord { x: 10.001, y: 60.0 });
        rec.to.0 = "FV999".to_string();
        let skipped = build_relations(&mut graph, &[rec], &spans, &junctions);
        assert_eq!(skipped, vec![SkipReason::UnknownPosition("FV999".to_string())]);
    }

    #[test]
    fn thoroughfare_restriction_maps_to_no_entry() {
        let (mut graph, spans, junctions) = setup();
        let mut rec = record(Coord { x: 10.001, y: 60.0 });
        rec.kind = RestrictionKind::NoThroughTraffic;
        let skipped = build_relations(&mut graph, &[rec], &spans, &junctions);
        assert!(skipped.is_empty());
        assert_eq!(
            graph.relations[0].tags.get("restriction").map(String::as_str),
            Some("no_entry")
        );
    }
}
