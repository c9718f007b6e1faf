//! Pathway networks: the derived artifact built from finished pathways.
//!
//! A network is the union of every finished pathway of one type, flattened
//! into sized segments. It is built lazily through the queue cache, so every
//! reader shares one instance until another pathway of that type retires.

use procgen_eval::{Queue, QueueEntry};
use procgen_types::{cyrb53, Point, Raw};
use serde::Serialize;
use std::sync::Arc;

/// A sized stretch between two pathway points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    /// Full width across the segment.
    pub width: f64,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    /// Point at `along` (0..1) on the centre line, shifted sideways by
    /// `across` (-0.5..0.5) of the width.
    fn point_at(&self, along: f64, across: f64) -> Point {
        let centre = self.start.lerp(&self.end, along);
        let offset = across * self.width;
        let length = self.length();
        if length == 0.0 {
            return Point::new(centre.x + offset, centre.y, centre.z);
        }
        let (nx, ny) = (
            -(self.end.y - self.start.y) / length,
            (self.end.x - self.start.x) / length,
        );
        Point::new(centre.x + nx * offset, centre.y + ny * offset, centre.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayNetwork {
    #[serde(rename = "type")]
    pub kind: String,
    pub segments: Vec<Segment>,
    pub total_length: f64,
}

impl PathwayNetwork {
    /// Cache key of the network for pathways of `kind`.
    pub fn cache_key(kind: &str) -> String {
        format!("pathway/{kind}")
    }

    /// `true` for a finished pathway of `kind`.
    pub fn is_source(entry: &QueueEntry, kind: &str) -> bool {
        matches!(entry.raw(), Raw::Pathway(pathway) if pathway.kind == kind)
    }

    /// Build from the finished entries; `None` while no pathway of `kind`
    /// has finished.
    pub fn build<'a>(results: impl IntoIterator<Item = &'a QueueEntry>, kind: &str) -> Option<Self> {
        let mut segments = Vec::new();
        for entry in results {
            let Raw::Pathway(pathway) = entry.raw() else {
                continue;
            };
            if pathway.kind != kind {
                continue;
            }
            match pathway.points.as_slice() {
                [] => {}
                [only] => {
                    let at = Point::new(only.x, only.y, 0.0);
                    segments.push(Segment {
                        start: at,
                        end: at,
                        width: only.size,
                    });
                }
                points => segments.extend(points.windows(2).map(|pair| Segment {
                    start: Point::new(pair[0].x, pair[0].y, 0.0),
                    end: Point::new(pair[1].x, pair[1].y, 0.0),
                    width: (pair[0].size + pair[1].size) / 2.0,
                })),
            }
        }
        if segments.is_empty() {
            return None;
        }
        let total_length = segments.iter().map(Segment::length).sum();
        Some(Self {
            kind: kind.to_string(),
            segments,
            total_length,
        })
    }

    /// The network for `kind`, shared through the queue cache. Only newly
    /// finished pathways of `kind` trigger a rebuild.
    pub fn cached(queue: &mut Queue, kind: &str) -> Option<Arc<Self>> {
        queue.get_cached(
            &Self::cache_key(kind),
            |entry| Self::is_source(entry, kind),
            |results| Self::build(results.iter().copied(), kind),
        )
    }

    /// `amount` points on the network, reproducible for the same `key`.
    ///
    /// Segments are weighted by length; a network of zero-length segments
    /// is sampled uniformly.
    pub fn sample(&self, key: &str, amount: usize) -> Vec<Point> {
        (0..amount)
            .map(|index| {
                let draw = format!("{key}{index}");
                let pick = unit(cyrb53(&draw, 1));
                let segment = self.pick_segment(pick);
                segment.point_at(unit(cyrb53(&draw, 2)), unit(cyrb53(&draw, 3)) - 0.5)
            })
            .collect()
    }

    fn pick_segment(&self, draw: f64) -> &Segment {
        let last = self.segments.len() - 1;
        if self.total_length <= 0.0 {
            let index = (draw * self.segments.len() as f64) as usize;
            return &self.segments[index.min(last)];
        }
        let target = draw * self.total_length;
        let mut covered = 0.0;
        for segment in &self.segments {
            covered += segment.length();
            if target <= covered {
                return segment;
            }
        }
        &self.segments[last]
    }
}

fn unit(hash: u64) -> f64 {
    hash as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen_types::{MotionEntity, Pathway, PathwayPoint, Progress, Value, Variables};

    fn pathway_entry(id: &str, kind: &str, points: &[(f64, f64, f64)]) -> QueueEntry {
        let pathway = Pathway {
            points: points
                .iter()
                .map(|&(x, y, size)| PathwayPoint {
                    x,
                    y,
                    size,
                    ast_id: "p".into(),
                })
                .collect(),
            kind: kind.into(),
        };
        QueueEntry::new(id, Value::new(pathway.into(), Variables::new()), "0", vec![])
    }

    #[test]
    fn builds_only_from_pathways_of_the_requested_kind() {
        let results = vec![
            pathway_entry("0", "street", &[(0.0, 0.0, 4.0), (10.0, 0.0, 4.0), (10.0, 10.0, 2.0)]),
            pathway_entry("1", "footwalk", &[(0.0, 5.0, 1.0), (3.0, 5.0, 1.0)]),
        ];
        let street = PathwayNetwork::build(&results, "street").unwrap();
        assert_eq!(street.segments.len(), 2);
        assert_eq!(street.total_length, 20.0);
        assert_eq!(street.segments[1].width, 3.0);
        assert!(PathwayNetwork::build(&results, "rail").is_none());
        assert!(PathwayNetwork::build(std::iter::empty(), "street").is_none());
    }

    #[test]
    fn samples_stay_within_the_segment_bounds() {
        let results = vec![pathway_entry("0", "street", &[(0.0, 0.0, 4.0), (10.0, 0.0, 4.0)])];
        let street = PathwayNetwork::build(&results, "street").unwrap();
        let points = street.sample("00", 32);
        assert_eq!(points.len(), 32);
        for p in &points {
            assert!((0.0..=10.0).contains(&p.x), "{p:?}");
            assert!((-2.0..=2.0).contains(&p.y), "{p:?}");
            assert_eq!(p.z, 0.0);
        }
        assert_eq!(points, street.sample("00", 32));
        assert_ne!(points, street.sample("10", 32));
    }

    #[test]
    fn single_point_pathways_form_a_degenerate_network() {
        let results = vec![pathway_entry("0", "street", &[(3.0, 4.0, 2.0)])];
        let street = PathwayNetwork::build(&results, "street").unwrap();
        assert_eq!(street.total_length, 0.0);
        let p = street.sample("x", 1)[0];
        assert!((2.0..=4.0).contains(&p.x));
        assert_eq!(p.y, 4.0);
    }

    #[test]
    fn cached_network_survives_unrelated_results() {
        let mut queue = Queue::new();
        queue.push(pathway_entry("0", "street", &[(0.0, 0.0, 4.0), (10.0, 0.0, 4.0)]), Progress(-1.0));
        let street = PathwayNetwork::cached(&mut queue, "street").unwrap();

        let walker = MotionEntity {
            keyframes: vec![],
            url: None,
            radius: 1.0,
            kind: "pedestrian".into(),
        };
        queue.push(
            QueueEntry::new("1", Value::new(walker.into(), Variables::new()), "0", vec![]),
            Progress(3.0),
        );
        queue.push(pathway_entry("2", "footwalk", &[(0.0, 5.0, 1.0)]), Progress(-1.0));
        let again = PathwayNetwork::cached(&mut queue, "street").unwrap();
        assert!(Arc::ptr_eq(&street, &again));

        queue.push(pathway_entry("3", "street", &[(0.0, 0.0, 4.0), (0.0, 8.0, 4.0)]), Progress(-1.0));
        let extended = PathwayNetwork::cached(&mut queue, "street").unwrap();
        assert!(!Arc::ptr_eq(&street, &extended));
        assert_eq!(extended.segments.len(), 2);
        assert_eq!(extended.total_length, 18.0);
    }
}
