//! Tag mapping for point features.
//!
//! Point features arrive already typed by the loader, so the mapping here
//! is a plain value table per feature kind.

use crate::models::{BarrierKind, CalmingKind, PointKind, RailwayProtection, Tags};

/// Produce the tag set for one point feature.
pub fn feature_tags(kind: &PointKind) -> Tags {
    let mut tags = Tags::default();
    match kind {
        PointKind::Crossing { signal_controlled } => {
            tags.insert("highway".to_string(), "crossing".to_string());
            if *signal_controlled {
                tags.insert("crossing".to_string(), "traffic_signals".to_string());
            }
        }
        PointKind::RailwayCrossing(protection) => {
            tags.insert("railway".to_string(), "level_crossing".to_string());
            match protection {
                RailwayProtection::FullBarrier => {
                    tags.insert("crossing:barrier".to_string(), "full".to_string());
                }
                RailwayProtection::HalfBarrier => {
                    tags.insert("crossing:barrier".to_string(), "half".to_string());
                }
                RailwayProtection::LightAndSound => {
                    tags.insert("crossing:light".to_string(), "yes".to_string());
                    tags.insert("crossing:bell".to_string(), "yes".to_string());
                }
                RailwayProtection::Light => {
                    tags.insert("crossing:light".to_string(), "yes".to_string());
                }
                RailwayProtection::Sound => {
                    tags.insert("crossing:bell".to_string(), "yes".to_string());
                }
                RailwayProtection::Saltire => {
                    tags.insert("crossing:saltire".to_string(), "yes".to_string());
                }
                RailwayProtection::None => {
                    tags.insert("crossing".to_string(), "uncontrolled".to_string());
                }
            }
        }
        PointKind::TrafficCalming(calming) => {
            let value = match calming {
                CalmingKind::Choker => "choker",
                CalmingKind::Hump => "hump",
                CalmingKind::Chicane => "chicane",
                CalmingKind::Island => "island",
                CalmingKind::Dip => "dip",
                CalmingKind::Cushion => "cushion",
                CalmingKind::Table => "table",
                CalmingKind::Other => "yes",
            };
            tags.insert("traffic_calming".to_string(), value.to_string());
        }
        PointKind::Barrier(barrier) => {
            let value = match barrier {
                BarrierKind::Bollard => "bollard",
                BarrierKind::SwingGate => "swing_gate",
                BarrierKind::CycleBarrier => "cycle_barrier",
                BarrierKind::LiftGate => "lift_gate",
                BarrierKind::JerseyBarrier => "jersey_barrier",
                BarrierKind::BusTrap => "bus_trap",
                BarrierKind::Other => "yes",
            };
            tags.insert("barrier".to_string(), value.to_string());
        }
        PointKind::SpeedCamera { maxspeed } => {
            tags.insert("highway".to_string(), "speed_camera".to_string());
            if let Some(speed) = maxspeed.filter(|&s| s > 0 && s <= 120) {
                tags.insert("maxspeed".to_string(), speed.to_string());
            }
        }
    }
    tags
}
