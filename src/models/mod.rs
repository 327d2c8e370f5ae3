use chrono::NaiveDate;
use geo_types::{Coord, LineString};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::reference::GroupKey;

/// Coordinate hash for fast lookups (8 bytes)
pub type CoordHash = u64;

/// Hash a coordinate to u64 for use as map keys
pub fn hash_coord(coord: &Coord) -> CoordHash {
    let lat = (coord.y * 10_000_000.0).round() as i64;
    let lon = (coord.x * 10_000_000.0).round() as i64;
    // Each half is kept to 32 bits; a sign-extended negative longitude
    // would otherwise bleed into the latitude bits.
    ((lat as u64) << 32) | (lon as u64 & 0xFFFF_FFFF)
}

/// NVDB attribute value (can be int, float, string or flag)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl AttrValue {
    pub fn as_string(&self) -> String {
        match self {
            AttrValue::Integer(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Text(s) => s.clone(),
            AttrValue::Flag(b) => b.to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(i) => Some(*i),
            AttrValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Integer(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        match self {
            AttrValue::Integer(i) => *i != 0,
            AttrValue::Float(f) => *f != 0.0,
            AttrValue::Text(s) => !s.is_empty(),
            AttrValue::Flag(b) => *b,
        }
    }
}

/// Attribute kinds carried by road object records.
///
/// One kind per tagging concern; the resolver keeps at most one effective
/// value per (kind, direction) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    FunctionalClass,
    SpeedLimit,
    Surface,
    Name,
    LaneCode,
    Oneway,
    Motorway,
    MotorRoad,
    Medium,
    MaxHeight,
    MaxWeight,
    Access,
}

/// Source object layer a record came from. Determines precedence when
/// overlapping records of the same kind conflict: the more specific
/// object type wins over attributes inherited from the link itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadObjectType {
    /// Attributes carried on the road link record itself
    RoadNetwork,
    FunctionalClass,
    SpeedLimit,
    Pavement,
    StreetName,
    MotorwayDesignation,
    OnewayRegulation,
    LaneSection,
    HeightLimit,
    WeightLimit,
    AccessRestriction,
}

impl RoadObjectType {
    /// Precedence rank. Dedicated object layers beat link attributes.
    pub fn specificity(self) -> u8 {
        match self {
            RoadObjectType::RoadNetwork => 0,
            RoadObjectType::FunctionalClass => 1,
            RoadObjectType::MotorwayDesignation => 1,
            RoadObjectType::Pavement => 2,
            RoadObjectType::StreetName => 2,
            RoadObjectType::LaneSection => 2,
            RoadObjectType::SpeedLimit => 3,
            RoadObjectType::OnewayRegulation => 3,
            RoadObjectType::HeightLimit => 3,
            RoadObjectType::WeightLimit => 3,
            RoadObjectType::AccessRestriction => 3,
        }
    }
}

/// Direction qualifier on an attribute record, relative to segment geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    Both,
}

/// One road object attribute record overlapping a segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadObjectRecord {
    pub object_type: RoadObjectType,
    pub kind: AttributeKind,
    pub value: AttrValue,
    pub direction: Direction,
    /// Meter sub-range along the reference covered by this record.
    /// None covers the whole segment.
    pub coverage: Option<(f64, f64)>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl RoadObjectRecord {
    pub fn new(object_type: RoadObjectType, kind: AttributeKind, value: AttrValue) -> Self {
        Self {
            object_type,
            kind,
            value,
            direction: Direction::Both,
            coverage: None,
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn coverage(mut self, from: f64, to: f64) -> Self {
        self.coverage = Some((from, to));
        self
    }

    pub fn valid_from(mut self, date: NaiveDate) -> Self {
        self.valid_from = Some(date);
        self
    }
}

/// Road segment from NVDB, as delivered by the loader
#[derive(Debug, Clone)]
pub struct Segment {
    pub geometry: LineString<f64>,
    /// Raw road reference string, may be empty
    pub reference: String,
    /// Start/end position along the reference, in meters
    pub meter_range: (f64, f64),
    pub records: Vec<RoadObjectRecord>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl Segment {
    pub fn new(reference: &str, meter_range: (f64, f64), geometry: LineString<f64>) -> Self {
        Self {
            geometry,
            reference: reference.to_string(),
            meter_range,
            records: Vec::new(),
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn length(&self) -> f64 {
        use geo::algorithm::haversine_length::HaversineLength;
        self.geometry.haversine_length()
    }
}

/// Node-level point feature overlaid on the network (crossing, barrier, etc.)
#[derive(Debug, Clone)]
pub struct PointFeature {
    pub coord: Coord,
    pub kind: PointKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointKind {
    Crossing { signal_controlled: bool },
    RailwayCrossing(RailwayProtection),
    TrafficCalming(CalmingKind),
    Barrier(BarrierKind),
    SpeedCamera { maxspeed: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RailwayProtection {
    FullBarrier,
    HalfBarrier,
    LightAndSound,
    Light,
    Sound,
    Saltire,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalmingKind {
    Choker,
    Hump,
    Chicane,
    Island,
    Dip,
    Cushion,
    Table,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarrierKind {
    Bollard,
    SwingGate,
    CycleBarrier,
    LiftGate,
    JerseyBarrier,
    BusTrap,
    Other,
}

/// Turn/thoroughfare restriction record referencing the road network
#[derive(Debug, Clone)]
pub struct RestrictionRecord {
    pub kind: RestrictionKind,
    /// Reference string plus meter position of the approach
    pub from: (String, f64),
    pub via: Coord,
    pub to: (String, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    NoLeftTurn,
    NoRightTurn,
    NoUTurn,
    NoStraightOn,
    NoThroughTraffic,
}

impl RestrictionKind {
    pub fn osm_value(self) -> &'static str {
        match self {
            RestrictionKind::NoLeftTurn => "no_left_turn",
            RestrictionKind::NoRightTurn => "no_right_turn",
            RestrictionKind::NoUTurn => "no_u_turn",
            RestrictionKind::NoStraightOn => "no_straight_on",
            RestrictionKind::NoThroughTraffic => "no_entry",
        }
    }
}

pub type Tags = FxHashMap<String, String>;

/// Output graph node
#[derive(Debug, Clone)]
pub struct OsmNode {
    pub id: i64,
    pub coord: Coord,
    pub tags: Tags,
}

/// Output graph way. Immutable after creation except for tag attachment.
#[derive(Debug, Clone)]
pub struct OsmWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: Tags,
    /// Source grouping key and meter span, retained for restriction lookups
    /// and manual reconciliation.
    pub group: GroupKey,
    pub meter_range: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
}

#[derive(Debug, Clone)]
pub struct OsmMember {
    pub id: i64,
    pub member_type: MemberType,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct OsmRelation {
    pub id: i64,
    pub members: Vec<OsmMember>,
    pub tags: Tags,
}

/// The complete output graph handed to an external serializer.
///
/// Ids are negative and descending from -1000, following the editor-import
/// convention of the original converter.
#[derive(Debug, Default)]
pub struct OsmGraph {
    pub nodes: Vec<OsmNode>,
    pub ways: Vec<OsmWay>,
    pub relations: Vec<OsmRelation>,
    next_id: i64,
}

impl OsmGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            ways: Vec::new(),
            relations: Vec::new(),
            next_id: -1000,
        }
    }

    pub fn next_id(&mut self) -> i64 {
        self.next_id -= 1;
        self.next_id
    }

    pub fn add_node(&mut self, coord: Coord) -> i64 {
        let id = self.next_id();
        self.nodes.push(OsmNode {
            id,
            coord,
            tags: Tags::default(),
        });
        id
    }

    pub fn node_mut(&mut self, id: i64) -> Option<&mut OsmNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Verify that every way references only nodes present in the graph.
    pub fn check_consistency(&self) -> Result<(), (i64, i64)> {
        let ids: rustc_hash::FxHashSet<i64> = self.nodes.iter().map(|n| n.id).collect();
        for way in &self.ways {
            for node_id in &way.nodes {
                if !ids.contains(node_id) {
                    return Err((way.id, *node_id));
                }
            }
        }
        Ok(())
    }
}
