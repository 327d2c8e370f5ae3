//! Road reference parsing.
//!
//! NVDB reference strings locate a segment within the national road
//! hierarchy, e.g. `"EV6"`, `"FV128 hp2 m0-1450"`, `"0400 EV6 S76D1 m100"`.
//! Parsing is best effort: anything recognizable is decoded, and strings
//! with no recognizable pattern fall back to an opaque grouping key so
//! that equal raw strings still group together. A hard parse failure
//! never halts a run.

use serde::{Deserialize, Serialize};

/// National road categories, in descending importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoadCategory {
    /// Europaveg (E)
    European,
    /// Riksveg (R)
    National,
    /// Fylkesveg (F)
    County,
    /// Kommunal veg (K)
    Municipal,
    /// Privat veg (P)
    Private,
    /// Skogsbilveg (S)
    Forest,
}

impl RoadCategory {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'E' => Some(RoadCategory::European),
            'R' => Some(RoadCategory::National),
            'F' => Some(RoadCategory::County),
            'K' => Some(RoadCategory::Municipal),
            'P' => Some(RoadCategory::Private),
            'S' => Some(RoadCategory::Forest),
            _ => None,
        }
    }
}

/// Road status letter following the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadStatus {
    /// V - eksisterende veg
    Existing,
    /// W, T - midlertidig veg/status
    Temporary,
    /// S - ferjestrekning
    Ferry,
    /// G, U - gang-/sykkelveg
    CycleRoad,
    /// A - anleggsveg (under construction)
    Construction,
    /// H - gang-/sykkelveg anlegg
    CycleConstruction,
    /// P - vedtatt veg (proposed)
    Proposed,
    /// Q - vedtatt gang-/sykkelveg
    CycleProposed,
    /// E - vedtatt ferjestrekning
    ProposedFerry,
    /// B - beredskapsveg
    Emergency,
    /// M - serviceveg
    Service,
    /// X - roemningstunnel
    EscapeTunnel,
}

impl RoadStatus {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'V' => Some(RoadStatus::Existing),
            'W' | 'T' => Some(RoadStatus::Temporary),
            'S' => Some(RoadStatus::Ferry),
            'G' | 'U' => Some(RoadStatus::CycleRoad),
            'A' => Some(RoadStatus::Construction),
            'H' => Some(RoadStatus::CycleConstruction),
            'P' => Some(RoadStatus::Proposed),
            'Q' => Some(RoadStatus::CycleProposed),
            'E' => Some(RoadStatus::ProposedFerry),
            'B' => Some(RoadStatus::Emergency),
            'M' => Some(RoadStatus::Service),
            'X' => Some(RoadStatus::EscapeTunnel),
            _ => None,
        }
    }
}

/// Parsed road reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefCode {
    pub category: RoadCategory,
    pub status: Option<RoadStatus>,
    pub number: u32,
    /// Section ("hovedparsell" or strekning)
    pub section: Option<u32>,
    /// Sub-section index within the section
    pub subsection: Option<u32>,
    /// Meter range along the section, start <= end
    pub meter_range: Option<(f64, f64)>,
}

impl RefCode {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::Ref {
            category: self.category,
            number: self.number,
            section: self.section,
        }
    }
}

/// Grouping key for the segment merger.
///
/// Segments with an unparseable reference are grouped only with
/// byte-identical raw strings. This under-merges formatting variants of
/// the same reference, which matches the source behavior; speculative
/// normalization is deliberately not attempted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    Ref {
        category: RoadCategory,
        number: u32,
        section: Option<u32>,
    },
    Opaque(String),
}

impl GroupKey {
    pub fn is_opaque(&self) -> bool {
        matches!(self, GroupKey::Opaque(_))
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Ref {
                category,
                number,
                section,
            } => {
                let letter = match category {
                    RoadCategory::European => 'E',
                    RoadCategory::National => 'R',
                    RoadCategory::County => 'F',
                    RoadCategory::Municipal => 'K',
                    RoadCategory::Private => 'P',
                    RoadCategory::Forest => 'S',
                };
                write!(f, "{}{}", letter, number)?;
                if let Some(hp) = section {
                    write!(f, " hp{}", hp)?;
                }
                Ok(())
            }
            GroupKey::Opaque(raw) => write!(f, "?{}", raw),
        }
    }
}

/// Parse a raw reference string.
///
/// Returns None for an empty string (segment has no reference and becomes
/// its own singleton group) and `Err(raw)` by way of the Opaque key for
/// strings with no recognizable category/number pattern.
pub fn parse_reference(raw: &str) -> Option<Result<RefCode, GroupKey>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match parse_parts(trimmed) {
        Some(code) => Some(Ok(code)),
        None => Some(Err(GroupKey::Opaque(trimmed.to_string()))),
    }
}

fn parse_parts(s: &str) -> Option<RefCode> {
    let mut tokens = s.split_whitespace();
    let head = tokens.next()?;

    // Leading municipality/county digits are locational, not part of the
    // road identity. "0400 EV6" and "0400EV6" both occur.
    let head = head.trim_start_matches(|c: char| c.is_ascii_digit());
    let head = if head.is_empty() { tokens.next()? } else { head };

    let mut chars = head.chars().peekable();
    let category = RoadCategory::from_char(*chars.peek()?)?;
    chars.next();

    // Optional status letter before the number
    let mut status = None;
    if let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() {
            status = RoadStatus::from_char(c);
            status?;
            chars.next();
        }
    }

    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    if digits.is_empty() || chars.next().is_some() {
        return None;
    }
    let number: u32 = digits.parse().ok()?;

    let mut code = RefCode {
        category,
        status,
        number,
        section: None,
        subsection: None,
        meter_range: None,
    };

    // Trailing tokens: hp<n>, S<n>[D<m>], m<a>[-<b>]. Unrecognized
    // trailing tokens are ignored rather than failing the whole string.
    for token in tokens {
        let lower = token.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("hp") {
            code.section = rest.parse().ok().or(code.section);
        } else if let Some(rest) = lower.strip_prefix('m') {
            if let Some(range) = parse_meter_range(rest) {
                code.meter_range = Some(range);
            }
        } else if let Some(rest) = lower.strip_prefix('s') {
            // Modern form "S76D1"
            if let Some((sec, sub)) = rest.split_once('d') {
                code.section = sec.parse().ok().or(code.section);
                code.subsection = sub.parse().ok();
            } else {
                code.section = rest.parse().ok().or(code.section);
            }
        }
    }

    if let Some((start, end)) = code.meter_range {
        if start > end {
            code.meter_range = Some((end, start));
        }
    }

    Some(code)
}

fn parse_meter_range(s: &str) -> Option<(f64, f64)> {
    if let Some((a, b)) = s.split_once('-') {
        let start: f64 = a.parse().ok()?;
        let end: f64 = b.parse().ok()?;
        Some((start, end))
    } else {
        let at: f64 = s.parse().ok()?;
        Some((at, at))
    }
}
