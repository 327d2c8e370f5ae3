//! Topology construction.
//!
//! Merged runs become ways over a shared node pool. Only run endpoints are
//! deduplicated: an endpoint within the snap tolerance of an existing
//! junction node reuses it, so crossing and touching runs connect through
//! shared nodes. Interior vertices always get fresh nodes. All node
//! creation goes through one builder, which keeps ids unique and lets a
//! final consistency check hold by construction.

use geo_types::Coord;
use rustc_hash::FxHashMap;

use crate::geometry::coord_distance;
use crate::merger::MergedRun;
use crate::models::{OsmGraph, OsmNode, OsmWay, Tags};
use crate::reference::GroupKey;

/// Grid-bucketed index of node positions for tolerance lookups.
///
/// The cell width is sized so a 3x3 neighborhood always covers the
/// tolerance radius, including the longitude shrink at high latitudes.
pub struct NodeIndex {
    tolerance: f64,
    cell_size: f64,
    cells: FxHashMap<(i64, i64), Vec<(i64, Coord)>>,
}

/// Meters per degree of longitude at 74 degrees north, the conservative
/// bound for the covered road networks.
const MIN_METERS_PER_DEGREE: f64 = 30_000.0;

impl NodeIndex {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cell_size: tolerance / MIN_METERS_PER_DEGREE,
            cells: FxHashMap::default(),
        }
    }

    fn cell(&self, coord: &Coord) -> (i64, i64) {
        (
            (coord.x / self.cell_size).floor() as i64,
            (coord.y / self.cell_size).floor() as i64,
        )
    }

    pub fn insert(&mut self, coord: Coord, id: i64) {
        let key = self.cell(&coord);
        self.cells.entry(key).or_default().push((id, coord));
    }

    /// Nearest indexed node within the tolerance, if any. Ties keep the
    /// node inserted first.
    pub fn nearest(&self, coord: &Coord) -> Option<i64> {
        let (cx, cy) = self.cell(coord);
        let mut best: Option<(i64, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for (id, candidate) in bucket {
                    let distance = coord_distance(coord, candidate);
                    if distance > self.tolerance {
                        continue;
                    }
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((*id, distance));
                    }
                }
            }
        }
        best.map(|(id, _)| id)
    }
}

/// Lookup result for a meter position within a group's ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanLookup {
    Unique(i64),
    /// Position falls on or inside more than one way span, typically the
    /// shared boundary where a run was split.
    Ambiguous(i64, i64),
    Missing,
}

/// Maps (group, meter position) back to the way covering it.
#[derive(Default)]
pub struct WaySpanTable {
    spans: FxHashMap<GroupKey, Vec<(f64, f64, i64)>>,
}

impl WaySpanTable {
    pub fn insert(&mut self, group: GroupKey, meter_range: (f64, f64), way_id: i64) {
        self.spans
            .entry(group)
            .or_default()
            .push((meter_range.0, meter_range.1, way_id));
    }

    pub fn find(&self, group: &GroupKey, position: f64) -> SpanLookup {
        let Some(spans) = self.spans.get(group) else {
            return SpanLookup::Missing;
        };
        let mut hits = spans
            .iter()
            .filter(|&&(from, to, _)| from <= position && position <= to)
            .map(|&(_, _, id)| id);
        match (hits.next(), hits.next()) {
            (None, _) => SpanLookup::Missing,
            (Some(id), None) => SpanLookup::Unique(id),
            (Some(a), Some(b)) => SpanLookup::Ambiguous(a, b),
        }
    }
}

/// Graph plus the side tables later stages need.
pub struct Topology {
    pub graph: OsmGraph,
    /// Endpoint nodes only, for connecting runs and resolving via nodes.
    pub junctions: NodeIndex,
    /// Every way vertex, for snapping point features.
    pub vertices: NodeIndex,
    pub spans: WaySpanTable,
    /// Source run index behind each way, in way order.
    pub way_runs: Vec<usize>,
    /// Runs that collapsed below two distinct nodes and were dropped.
    pub degenerate_runs: usize,
}

/// Build the node/way graph from merged runs.
///
/// Ways are created in run order; `way_runs[i]` names the run behind
/// `graph.ways[i]` (degenerate runs produce no way).
pub fn build_graph(runs: &[MergedRun], snap_tolerance: f64) -> Topology {
    let mut graph = OsmGraph::new();
    let mut junctions = NodeIndex::new(snap_tolerance);
    let mut vertices = NodeIndex::new(snap_tolerance);
    let mut spans = WaySpanTable::default();
    let mut way_runs = Vec::with_capacity(runs.len());
    let mut degenerate_runs = 0;

    for (run_idx, run) in runs.iter().enumerate() {
        let last = run.polyline.len().saturating_sub(1);
        let mut node_ids: Vec<i64> = Vec::with_capacity(run.polyline.len());
        // Nodes for this run are staged and only committed once the run
        // is known to form a way, so degenerate runs leave no orphans.
        let mut staged: Vec<(Coord, i64, bool)> = Vec::new();

        for (i, coord) in run.polyline.iter().enumerate() {
            let endpoint = i == 0 || i == last;
            let id = if endpoint {
                let existing = junctions
                    .nearest(coord)
                    .or_else(|| staged_endpoint_near(&staged, coord, snap_tolerance));
                match existing {
                    Some(existing) => existing,
                    None => {
                        let id = graph.next_id();
                        staged.push((*coord, id, true));
                        id
                    }
                }
            } else {
                let id = graph.next_id();
                staged.push((*coord, id, false));
                id
            };
            // Snapping can collapse adjacent vertices onto one node.
            if node_ids.last() != Some(&id) {
                node_ids.push(id);
            }
        }

        if node_ids.len() < 2 {
            degenerate_runs += 1;
            continue;
        }

        for (coord, id, endpoint) in staged {
            graph.nodes.push(OsmNode {
                id,
                coord,
                tags: Tags::default(),
            });
            if endpoint {
                junctions.insert(coord, id);
            }
            vertices.insert(coord, id);
        }

        let way_id = graph.next_id();
        spans.insert(run.group.clone(), run.meter_range, way_id);
        way_runs.push(run_idx);
        graph.ways.push(OsmWay {
            id: way_id,
            nodes: node_ids,
            tags: Tags::default(),
            group: run.group.clone(),
            meter_range: run.meter_range,
        });
    }

    Topology {
        graph,
        junctions,
        vertices,
        spans,
        way_runs,
        degenerate_runs,
    }
}

/// Nearest staged endpoint within tolerance, for endpoints of the run
/// currently being built that are not yet in the junction index.
fn staged_endpoint_near(
    staged: &[(Coord, i64, bool)],
    coord: &Coord,
    tolerance: f64,
) -> Option<i64> {
    staged
        .iter()
        .filter(|(c, _, endpoint)| *endpoint && coord_distance(c, coord) <= tolerance)
        .min_by(|(a, _, _), (b, _, _)| {
            coord_distance(a, coord)
                .partial_cmp(&coord_distance(b, coord))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|&(_, id, _)| id)
}

/// Attach point features to the graph. A feature within the snap tolerance
/// of a way vertex tags that node; otherwise it becomes a standalone node.
/// Returns the number of standalone nodes created.
pub fn attach_point_features(topo: &mut Topology, features: &[(Coord, Tags)]) -> usize {
    let mut standalone = 0;
    for (coord, tags) in features {
        match topo.vertices.nearest(coord) {
            Some(id) => {
                if let Some(node) = topo.graph.node_mut(id) {
                    for (k, v) in tags {
                        node.tags.insert(k.clone(), v.clone());
                    }
                }
            }
            None => {
                let id = topo.graph.add_node(*coord);
                if let Some(node) = topo.graph.node_mut(id) {
                    node.tags = tags.clone();
                }
                topo.vertices.insert(*coord, id);
                standalone += 1;
            }
        }
    }
    standalone
}
