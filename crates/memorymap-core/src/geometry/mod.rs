//! Canonical geometry model.
//!
//! Canonical geometries are GeoJSON-shaped and always store positions as
//! `[longitude, latitude]`. Map display code (the drawing surface, map
//! centers) works in latitude-then-longitude; [`codec`] is the only place
//! where the two orders meet.

pub mod codec;

use crate::error::{Error, Result};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `[lng, lat]` position.
pub type Position = [f64; 2];

/// Minimum number of positions in a closed polygon ring.
pub const MIN_RING_POSITIONS: usize = 4;

/// Minimum number of positions in a line string.
pub const MIN_LINE_POSITIONS: usize = 2;

/// The kind of a feature, as stored by the remote API (`feature_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Point,
    Line,
    Polygon,
}

impl FeatureKind {
    /// Placeholder title given to freshly drawn features.
    pub fn default_title(self) -> &'static str {
        match self {
            FeatureKind::Point => "New Point",
            FeatureKind::Line => "New Line",
            FeatureKind::Polygon => "New Polygon",
        }
    }

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Point => "point",
            FeatureKind::Line => "line",
            FeatureKind::Polygon => "polygon",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical geometry, serialized exactly like a GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    /// Rings of positions; only the first (outer) ring is meaningful.
    Polygon(Vec<Vec<Position>>),
}

impl Geometry {
    /// The feature kind this geometry belongs to.
    pub fn kind(&self) -> FeatureKind {
        match self {
            Geometry::Point(_) => FeatureKind::Point,
            Geometry::LineString(_) => FeatureKind::Line,
            Geometry::Polygon(_) => FeatureKind::Polygon,
        }
    }

    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    /// Build a polygon from a single ring, closing it if needed.
    pub fn polygon_from_ring(mut ring: Vec<Position>) -> Self {
        close_ring(&mut ring);
        Geometry::Polygon(vec![ring])
    }

    /// The outer ring of a polygon.
    pub fn outer_ring(&self) -> Option<&[Position]> {
        match self {
            Geometry::Polygon(rings) => rings.first().map(Vec::as_slice),
            _ => None,
        }
    }

    /// Iterate over every position of the geometry.
    pub fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Geometry::Point(p) => Box::new(std::iter::once(p)),
            Geometry::LineString(coords) => Box::new(coords.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
        }
    }

    /// Check the structural invariants of the geometry.
    ///
    /// A line string needs at least two positions; a polygon's outer ring
    /// needs at least four positions with the first equal to the last.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self.positions().find(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(Error::validation(format!(
                "{} has a non-finite coordinate {:?}",
                self.type_name(),
                bad
            )));
        }

        match self {
            Geometry::Point(_) => Ok(()),
            Geometry::LineString(coords) => {
                if coords.len() < MIN_LINE_POSITIONS {
                    return Err(Error::validation(format!(
                        "LineString needs at least {} positions, got {}",
                        MIN_LINE_POSITIONS,
                        coords.len()
                    )));
                }
                Ok(())
            }
            Geometry::Polygon(rings) => {
                let ring = rings
                    .first()
                    .ok_or_else(|| Error::validation("Polygon has no rings"))?;
                if ring.len() < MIN_RING_POSITIONS {
                    return Err(Error::validation(format!(
                        "Polygon ring needs at least {} positions, got {}",
                        MIN_RING_POSITIONS,
                        ring.len()
                    )));
                }
                if ring.first() != ring.last() {
                    return Err(Error::validation("Polygon ring is not closed"));
                }
                Ok(())
            }
        }
    }

    /// Bounding box in canonical space (x = longitude, y = latitude).
    pub fn bounds(&self) -> Rect {
        let mut positions = self.positions();
        let Some(first) = positions.next() else {
            return Rect::ZERO;
        };
        let seed = Rect::new(first[0], first[1], first[0], first[1]);
        positions.fold(seed, |rect, p| {
            rect.union_pt(kurbo::Point::new(p[0], p[1]))
        })
    }
}

/// Append the first position to a ring if it is not already closed.
pub fn close_ring(ring: &mut Vec<Position>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first != *last {
            ring.push(first);
        }
    }
}
