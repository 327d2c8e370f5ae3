//! Tag mapping for ways.
//!
//! Translates each merged run's reference code and resolved attribute set
//! into output tags. The value tables are static data; the mapping
//! functions stay small and run in a fixed order because later rules
//! (motorway override, structure tags) overwrite earlier ones.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::attributes::AttributeSet;
use crate::merger::MergedRun;
use crate::models::{AttributeKind, Tags};
use crate::reference::{RefCode, RoadCategory, RoadStatus};

pub mod nodes;

static CATEGORY_CLASSES: OnceLock<FxHashMap<RoadCategory, &'static str>> = OnceLock::new();
static FUNCTIONAL_CLASSES: OnceLock<FxHashMap<i64, &'static str>> = OnceLock::new();

fn init_category_classes() -> FxHashMap<RoadCategory, &'static str> {
    let mut map = FxHashMap::default();
    map.insert(RoadCategory::European, "trunk"); // Europaveg
    map.insert(RoadCategory::National, "trunk"); // Riksveg
    map.insert(RoadCategory::County, "secondary"); // Fylkesveg
    map.insert(RoadCategory::Municipal, "residential"); // Kommunal veg
    map.insert(RoadCategory::Private, "service"); // Privat veg
    map.insert(RoadCategory::Forest, "track"); // Skogsbilveg
    map
}

/// Funksjonell vegklass fallback for segments without a decoded category
fn init_functional_classes() -> FxHashMap<i64, &'static str> {
    let mut map = FxHashMap::default();
    map.insert(1, "trunk");
    map.insert(2, "trunk");
    map.insert(3, "primary");
    map.insert(4, "secondary");
    map.insert(5, "tertiary");
    map.insert(6, "unclassified");
    map.insert(7, "residential");
    map
}

/// Produce the tag set for one merged run.
pub fn way_tags(run: &MergedRun) -> Tags {
    let mut tags = Tags::default();
    let attrs = &run.attrs;
    let oneway = attrs.is_oneway();

    // Oneway first: every directional tag below depends on it.
    if oneway {
        tags.insert("oneway".to_string(), "yes".to_string());
    }

    let tag_key = map_highway(&mut tags, run.refcode.as_ref(), attrs);
    map_motorway_override(&mut tags, attrs, tag_key);
    map_maxspeed(&mut tags, attrs, oneway);
    map_access(&mut tags, attrs, oneway);
    map_lanes(&mut tags, attrs);
    map_structure(&mut tags, attrs, run.refcode.as_ref());
    map_surface(&mut tags, attrs);
    map_dimensions(&mut tags, attrs, oneway);
    map_name(&mut tags, attrs);

    tags
}

/// Highway classification from the reference code, with the functional
/// class attribute as fallback when no category was decoded.
///
/// Returns the key classification went under ("highway", "construction",
/// "proposed:highway", "route") so the motorway override knows whether it
/// may apply.
fn map_highway(tags: &mut Tags, refcode: Option<&RefCode>, attrs: &AttributeSet) -> &'static str {
    let Some(code) = refcode else {
        // Unreferenced or opaque: classify from the functional class alone.
        let classes = FUNCTIONAL_CLASSES.get_or_init(init_functional_classes);
        if let Some(class) = attrs
            .common(AttributeKind::FunctionalClass)
            .and_then(|v| v.as_i64())
            .and_then(|k| classes.get(&k))
        {
            tags.insert("highway".to_string(), class.to_string());
        }
        return "highway";
    };

    // Status selects the key (proposed, construction, existing).
    let tag_key = match code.status {
        Some(RoadStatus::Construction) | Some(RoadStatus::CycleConstruction) => {
            tags.insert("highway".to_string(), "construction".to_string());
            "construction"
        }
        Some(RoadStatus::Proposed) | Some(RoadStatus::CycleProposed) => "proposed:highway",
        Some(RoadStatus::ProposedFerry) => "proposed:route",
        Some(RoadStatus::Ferry) => "route",
        _ => "highway",
    };

    match code.status {
        Some(RoadStatus::CycleRoad)
        | Some(RoadStatus::CycleConstruction)
        | Some(RoadStatus::CycleProposed) => {
            tags.insert(tag_key.to_string(), "cycleway".to_string());
        }
        Some(RoadStatus::Ferry) | Some(RoadStatus::ProposedFerry) => {
            tags.insert(tag_key.to_string(), "ferry".to_string());
            insert_tag(tags, "ref", &format_ref(code));
        }
        _ => {
            let section = code.section.unwrap_or(0);
            if (800..=998).contains(&section) {
                // Trafikklommer, rasteplasser
                tags.insert(tag_key.to_string(), "unclassified".to_string());
            } else {
                let link = if matches!(
                    code.category,
                    RoadCategory::European | RoadCategory::National | RoadCategory::County
                ) && (70..=199).contains(&section)
                {
                    "_link"
                } else {
                    ""
                };

                let classes = CATEGORY_CLASSES.get_or_init(init_category_classes);
                // Post-reform county roads keep short numbers, former
                // national roads, and rank above ordinary fylkesveger.
                let class = if code.category == RoadCategory::County && code.number < 1000 {
                    "primary"
                } else {
                    classes.get(&code.category).copied().unwrap_or("road")
                };
                tags.insert(tag_key.to_string(), format!("{}{}", class, link));
                insert_tag(tags, "ref", &format_ref(code));
            }

            if (400..=599).contains(&section) {
                tags.insert("junction".to_string(), "roundabout".to_string());
            }
        }
    }

    if code.status == Some(RoadStatus::EscapeTunnel) {
        tags.insert("tunnel".to_string(), "yes".to_string());
        tags.insert("layer".to_string(), "-1".to_string());
    }

    tag_key
}

fn format_ref(code: &RefCode) -> String {
    match code.category {
        RoadCategory::European => format!("E {}", code.number),
        RoadCategory::National | RoadCategory::County => code.number.to_string(),
        _ => String::new(),
    }
}

/// Motorway/motortrafikkveg override, after the category classification
fn map_motorway_override(tags: &mut Tags, attrs: &AttributeSet, tag_key: &str) {
    if attrs.common(AttributeKind::Motorway).map_or(false, |v| v.is_set()) {
        if tag_key == "highway" && tags.contains_key("highway") {
            tags.insert("highway".to_string(), "motorway".to_string());
        }
    } else if attrs.common(AttributeKind::MotorRoad).map_or(false, |v| v.is_set()) {
        tags.insert("motorroad".to_string(), "yes".to_string());
    }
}

fn map_maxspeed(tags: &mut Tags, attrs: &AttributeSet, oneway: bool) {
    let f = attrs
        .forward(AttributeKind::SpeedLimit)
        .and_then(|v| v.as_i64())
        .filter(|&v| v > 0 && v <= 120)
        .map(|v| v.to_string());
    let b = attrs
        .backward(AttributeKind::SpeedLimit)
        .and_then(|v| v.as_i64())
        .filter(|&v| v > 0 && v <= 120)
        .map(|v| v.to_string());
    tag_direction(tags, oneway, "maxspeed", f, b);
}

fn map_access(tags: &mut Tags, attrs: &AttributeSet, oneway: bool) {
    let f = attrs
        .forward(AttributeKind::Access)
        .filter(|v| v.is_set())
        .map(|_| "no".to_string());
    let b = attrs
        .backward(AttributeKind::Access)
        .filter(|v| v.is_set())
        .map(|_| "no".to_string());
    tag_direction(tags, oneway, "motor_vehicle", f, b);
}

fn map_surface(tags: &mut Tags, attrs: &AttributeSet) {
    let Some(value) = attrs.common(AttributeKind::Surface) else {
        return;
    };
    match value.as_i64() {
        Some(1) => insert_tag(tags, "surface", "paved"),
        Some(2) => insert_tag(tags, "surface", "unpaved"),
        Some(_) => {}
        None => {
            if let Some(text) = value.as_str() {
                insert_tag(tags, "surface", text);
            }
        }
    }
}

/// Tunnels and bridges from the medium code.
fn map_structure(tags: &mut Tags, attrs: &AttributeSet, refcode: Option<&RefCode>) {
    // An escape tunnel already carries its structure tags.
    if refcode.map(|c| c.status) == Some(Some(RoadStatus::EscapeTunnel)) {
        return;
    }
    let Some(medium) = attrs.common(AttributeKind::Medium).and_then(|v| v.as_str().map(str::to_string)) else {
        return;
    };
    match medium.as_str() {
        // Under terrenget, under sjoebunnen, under isbre
        "U" | "W" | "J" => {
            tags.insert("tunnel".to_string(), "yes".to_string());
            tags.insert("layer".to_string(), "-1".to_string());
        }
        // I bygning
        "B" => {
            tags.insert("tunnel".to_string(), "building_passage".to_string());
        }
        // I luft
        "L" => {
            tags.insert("bridge".to_string(), "yes".to_string());
            tags.insert("layer".to_string(), "1".to_string());
        }
        _ => {}
    }
}

fn map_dimensions(tags: &mut Tags, attrs: &AttributeSet, oneway: bool) {
    if let Some(height) = attrs
        .common(AttributeKind::MaxHeight)
        .and_then(|v| v.as_f64())
        .filter(|&h| h > 0.0 && h < 10.0)
    {
        tags.insert("maxheight".to_string(), format!("{:.1}", height));
    }

    let f = attrs
        .forward(AttributeKind::MaxWeight)
        .and_then(|v| v.as_f64())
        .filter(|&w| w > 0.0 && w < 100.0)
        .map(|w| format!("{:.1}", w));
    let b = attrs
        .backward(AttributeKind::MaxWeight)
        .and_then(|v| v.as_f64())
        .filter(|&w| w > 0.0 && w < 100.0)
        .map(|w| format!("{:.1}", w));
    tag_direction(tags, oneway, "maxweight", f, b);
}

fn map_name(tags: &mut Tags, attrs: &AttributeSet) {
    if let Some(name) = attrs.common(AttributeKind::Name).and_then(|v| v.as_str()) {
        let name = name.trim();
        if !name.is_empty() {
            tags.insert("name".to_string(), name.to_string());
        }
    }
}

/// Directional tag application.
///
/// Equal forward/backward values emit one unsuffixed tag. Differing values
/// emit `:forward`/`:backward` suffixed tags. On a oneway the backward
/// value is meaningless and dropped, and the forward value loses its
/// suffix.
fn tag_direction(
    tags: &mut Tags,
    oneway: bool,
    key: &str,
    forward: Option<String>,
    backward: Option<String>,
) {
    if forward.is_some() && forward == backward {
        if let Some(v) = forward {
            tags.insert(key.to_string(), v);
        }
        return;
    }

    if let Some(v) = forward {
        if oneway {
            tags.insert(key.to_string(), v);
        } else {
            tags.insert(format!("{}:forward", key), v);
        }
    }
    if let Some(v) = backward {
        if !oneway {
            tags.insert(format!("{}:backward", key), v);
        }
    }
}

fn insert_tag(tags: &mut Tags, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        tags.insert(key.to_string(), value.to_string());
    }
}

/// Decoded per-direction lane detail from a "felt" code string.
#[derive(Default)]
struct LaneSide {
    count: u32,
    turn: String,
    psv: String,
    cycleway: bool,
}

/// Decode a lane code string like `"1#2"` or `"1H2#3V"` into lane tags.
///
/// Odd lane numbers run forward, even backward. Suffix letters: V left
/// turn, H right turn, K public transport lane, S cycle lane. Codes with
/// lanes in one direction only imply a oneway road. Without a lane code
/// no lane tag is guessed at all.
fn map_lanes(tags: &mut Tags, attrs: &AttributeSet) {
    let Some(code) = attrs.common(AttributeKind::LaneCode).and_then(|v| v.as_str().map(str::to_string))
    else {
        return;
    };

    let mut forward = LaneSide::default();
    let mut backward = LaneSide::default();

    for lane in code.split('#') {
        let bytes: Vec<char> = lane.chars().collect();
        if bytes.is_empty() {
            continue;
        }
        // Lane numbers can have two digits.
        let (number_len, turn) = if bytes.len() > 1 && bytes[1].is_ascii_digit() {
            (2, bytes.get(2).map(|c| c.to_ascii_uppercase()))
        } else {
            (1, bytes.get(1).map(|c| c.to_ascii_uppercase()))
        };
        let last_digit = bytes[number_len - 1];
        let odd = matches!(last_digit, '1' | '3' | '5' | '7' | '9');
        let side = if odd { &mut forward } else { &mut backward };

        match turn {
            Some('V') => {
                // Left turn lanes sort before through lanes.
                side.turn = format!("|left{}", side.turn);
                side.psv = format!("|{}", side.psv);
                side.count += 1;
            }
            Some('H') => {
                side.turn.push_str("|right");
                side.psv.push('|');
                side.count += 1;
            }
            Some('K') => {
                side.turn.push('|');
                side.psv.push_str("|designated");
                side.count += 1;
            }
            Some('S') => side.cycleway = true,
            _ => {
                side.turn.push('|');
                side.psv.push('|');
                side.count += 1;
            }
        }
    }

    for side in [&mut forward, &mut backward] {
        side.turn = strip_lane_list(&side.turn);
        side.psv = strip_lane_list(&side.psv);
    }

    if forward.count > 0 && backward.count > 0 {
        if forward.count > 1 && backward.count > 1 {
            insert_tag(tags, "turn:lanes:forward", &forward.turn);
            insert_tag(tags, "turn:lanes:backward", &backward.turn);
        }
        if forward.psv == "designated" && backward.psv == "designated" {
            insert_tag(tags, "psv", "designated");
            insert_tag(tags, "motorcar", "no");
        } else {
            insert_tag(tags, "psv:lanes:forward", &forward.psv);
            insert_tag(tags, "psv:lanes:backward", &backward.psv);
            insert_tag(tags, "motorcar:lanes:forward", &forward.psv.replace("designated", "no"));
            insert_tag(tags, "motorcar:lanes:backward", &backward.psv.replace("designated", "no"));
        }
        if !forward.turn.is_empty()
            || !backward.turn.is_empty()
            || !forward.psv.is_empty()
            || !backward.psv.is_empty()
            || forward.count > 1
            || backward.count > 1
        {
            insert_tag(tags, "lanes", &(forward.count + backward.count).to_string());
            if forward.count != backward.count {
                insert_tag(tags, "lanes:forward", &forward.count.to_string());
                insert_tag(tags, "lanes:backward", &backward.count.to_string());
            }
        }
    } else if forward.count > 0 || backward.count > 0 {
        let side = if forward.count > 0 { &forward } else { &backward };
        if side.count > 1 {
            insert_tag(tags, "turn:lanes", &side.turn);
        }
        if side.psv == "designated" {
            insert_tag(tags, "psv", "designated");
            insert_tag(tags, "motorcar", "no");
        } else {
            insert_tag(tags, "psv:lanes", &side.psv);
            insert_tag(tags, "motorcar:lanes", &side.psv.replace("designated", "no"));
        }
        if side.count > 1 {
            insert_tag(tags, "lanes", &side.count.to_string());
        }
        tags.insert("oneway".to_string(), "yes".to_string());
    }

    if forward.cycleway && backward.cycleway {
        insert_tag(tags, "cycleway", "lane");
    } else if forward.cycleway {
        insert_tag(tags, "cycleway:right", "lane");
    } else if backward.cycleway {
        insert_tag(tags, "cycleway:left", "lane");
    }
}

/// A lane list of only separators carries no information.
fn strip_lane_list(list: &str) -> String {
    let trimmed = list.strip_prefix('|').unwrap_or(list);
    if trimmed.trim_matches('|').is_empty() {
        String::new()
    } else {
        trimmed.to_string()
    }
}
