//! The payload carried by every queue entry and produced by every literal.
//!
//! Serialized untagged so programs and result payloads read as plain JSON:
//! an object with `keyframes` is a motion entity, one with `points` is a
//! pathway, one with `x`/`y`/`z` is a point.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Raw {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Raw>),
    Motion(MotionEntity),
    Pathway(Pathway),
    Point(Point),
}

impl Raw {
    /// Name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Raw::Nil => "nil",
            Raw::Bool(_) => "bool",
            Raw::Number(_) => "number",
            Raw::String(_) => "string",
            Raw::List(_) => "list",
            Raw::Motion(_) => "motion entity",
            Raw::Pathway(_) => "pathway",
            Raw::Point(_) => "point",
        }
    }

    /// Nonzero, non-empty, or `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Raw::Nil => false,
            Raw::Bool(b) => *b,
            Raw::Number(n) => *n != 0.0 && !n.is_nan(),
            Raw::String(s) => !s.is_empty(),
            Raw::List(items) => !items.is_empty(),
            Raw::Motion(_) | Raw::Pathway(_) | Raw::Point(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Raw::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Raw::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Raw::Nil)
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raw::Nil => write!(f, "nil"),
            Raw::Bool(b) => write!(f, "{b}"),
            Raw::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Raw::String(s) => f.write_str(s),
            Raw::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Raw::Motion(entity) => write!(f, "<{} entity>", entity.kind),
            Raw::Pathway(pathway) => write!(f, "<{} pathway>", pathway.kind),
            Raw::Point(p) => write!(f, "({}, {}, {})", p.x, p.y, p.z),
        }
    }
}

impl From<f64> for Raw {
    fn from(n: f64) -> Self {
        Raw::Number(n)
    }
}

impl From<bool> for Raw {
    fn from(b: bool) -> Self {
        Raw::Bool(b)
    }
}

impl From<&str> for Raw {
    fn from(s: &str) -> Self {
        Raw::String(s.to_string())
    }
}

impl From<String> for Raw {
    fn from(s: String) -> Self {
        Raw::String(s)
    }
}

impl From<Point> for Raw {
    fn from(p: Point) -> Self {
        Raw::Point(p)
    }
}

impl From<MotionEntity> for Raw {
    fn from(entity: MotionEntity) -> Self {
        Raw::Motion(entity)
    }
}

impl From<Pathway> for Raw {
    fn from(pathway: Pathway) -> Self {
        Raw::Pathway(pathway)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Payloads
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        let squared = dx * dx + dy * dy + dz * dz;
        if squared == 0.0 {
            0.0
        } else {
            squared.sqrt()
        }
    }

    /// Linear interpolation; `percent` 0 yields `self`, 1 yields `other`.
    pub fn lerp(&self, other: &Point, percent: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * percent,
            y: self.y + (other.y - self.y) * percent,
            z: self.z + (other.z - self.z) * percent,
        }
    }
}

/// A timed position of a motion entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Simulated time in seconds.
    pub t: f64,
    #[serde(rename = "astId")]
    pub ast_id: String,
    pub speed: f64,
}

impl Keyframe {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y, self.z)
    }
}

/// An animated agent: an ordered, time-increasing list of keyframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEntity {
    pub keyframes: Vec<Keyframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub radius: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl MotionEntity {
    pub fn last_keyframe(&self) -> Option<&Keyframe> {
        self.keyframes.last()
    }

    /// Time of the last keyframe; zero for an entity without keyframes.
    pub fn current_time(&self) -> f64 {
        self.keyframes.last().map_or(0.0, |k| k.t)
    }

    /// Interpolated position at `time`, searching backwards from the end.
    ///
    /// `tolerance` widens the accepted window around the keyframe span so
    /// a neighbour that finished slightly earlier is still found.
    pub fn position_at(&self, time: f64, tolerance: f64) -> Option<Point> {
        let keyframes = &self.keyframes;
        match keyframes.len() {
            0 => None,
            1 => {
                let only = &keyframes[0];
                if (only.t - time).abs() > tolerance {
                    None
                } else {
                    Some(only.position())
                }
            }
            len => {
                let mut index = len - 2;
                while index > 0 && keyframes[index].t > time {
                    index -= 1;
                }
                let (from, to) = (&keyframes[index], &keyframes[index + 1]);
                if from.t <= time + tolerance && time - tolerance <= to.t {
                    let span = to.t - from.t;
                    let percent = if span == 0.0 { 1.0 } else { (time - from.t) / span };
                    Some(from.position().lerp(&to.position(), percent))
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    #[serde(rename = "astId")]
    pub ast_id: String,
}

/// A polyline of sized points, e.g. a street or a footwalk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub points: Vec<PathwayPoint>,
    #[serde(rename = "type")]
    pub kind: String,
}
