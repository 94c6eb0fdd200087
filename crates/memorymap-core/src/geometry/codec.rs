//! Conversion between drawing-surface shapes and canonical geometry.
//!
//! The drawing surface speaks latitude-then-longitude; canonical geometry is
//! longitude-then-latitude. Every conversion swaps the axes here and nowhere
//! else.

use super::{Geometry, Position};
use crate::error::{Error, Result};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A coordinate in map-display order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Canonical `[lng, lat]` position.
    pub fn to_position(self) -> Position {
        [self.lng, self.lat]
    }

    /// Build from a canonical `[lng, lat]` position.
    pub fn from_position(position: Position) -> Self {
        Self {
            lat: position[1],
            lng: position[0],
        }
    }
}

/// Shape kinds the drawing surface can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    Marker,
    Polyline,
    Polygon,
    Rectangle,
    Circle,
}

impl NativeKind {
    /// Whether shapes of this kind have a canonical representation.
    pub fn is_supported(self) -> bool {
        !matches!(self, NativeKind::Circle)
    }
}

impl fmt::Display for NativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeKind::Marker => "marker",
            NativeKind::Polyline => "polyline",
            NativeKind::Polygon => "polygon",
            NativeKind::Rectangle => "rectangle",
            NativeKind::Circle => "circle",
        };
        f.write_str(name)
    }
}

/// A shape as the drawing surface represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeShape {
    Marker(LatLng),
    Polyline(Vec<LatLng>),
    /// Rings as drawn; the surface does not repeat the first vertex.
    Polygon(Vec<Vec<LatLng>>),
    Rectangle { south_west: LatLng, north_east: LatLng },
    Circle { center: LatLng, radius_m: f64 },
}

impl NativeShape {
    pub fn kind(&self) -> NativeKind {
        match self {
            NativeShape::Marker(_) => NativeKind::Marker,
            NativeShape::Polyline(_) => NativeKind::Polyline,
            NativeShape::Polygon(_) => NativeKind::Polygon,
            NativeShape::Rectangle { .. } => NativeKind::Rectangle,
            NativeShape::Circle { .. } => NativeKind::Circle,
        }
    }
}

/// Convert a drawn shape to canonical geometry.
///
/// Polygon holes are dropped and the outer ring is closed. The result is
/// validated, so a degenerate ring or a one-vertex polyline is rejected here.
pub fn to_canonical(shape: &NativeShape) -> Result<Geometry> {
    let geometry = match shape {
        NativeShape::Marker(latlng) => Geometry::Point(latlng.to_position()),
        NativeShape::Polyline(vertices) => {
            Geometry::LineString(vertices.iter().map(|v| v.to_position()).collect())
        }
        NativeShape::Polygon(rings) => {
            if rings.len() > 1 {
                log::debug!("Dropping {} polygon hole(s)", rings.len() - 1);
            }
            let outer = rings.first().map(Vec::as_slice).unwrap_or_default();
            Geometry::polygon_from_ring(outer.iter().map(|v| v.to_position()).collect())
        }
        NativeShape::Rectangle {
            south_west,
            north_east,
        } => {
            let rect = Rect::from_points(
                Point::new(south_west.lng, south_west.lat),
                Point::new(north_east.lng, north_east.lat),
            );
            Geometry::polygon_from_ring(vec![
                [rect.x0, rect.y0],
                [rect.x0, rect.y1],
                [rect.x1, rect.y1],
                [rect.x1, rect.y0],
            ])
        }
        NativeShape::Circle { .. } => return Err(Error::UnsupportedGeometry(NativeKind::Circle)),
    };
    geometry.validate()?;
    Ok(geometry)
}

/// Convert canonical geometry back to a drawable shape.
pub fn from_canonical(geometry: &Geometry) -> NativeShape {
    match geometry {
        Geometry::Point(p) => NativeShape::Marker(LatLng::from_position(*p)),
        Geometry::LineString(coords) => {
            NativeShape::Polyline(coords.iter().copied().map(LatLng::from_position).collect())
        }
        Geometry::Polygon(rings) => {
            let mut ring: Vec<Position> = rings.first().cloned().unwrap_or_default();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            NativeShape::Polygon(vec![ring.into_iter().map(LatLng::from_position).collect()])
        }
    }
}

/// Normal form of a native shape: outer ring only, without a repeated
/// closing vertex, rectangles spelled out as their corner polygon.
///
/// Two shapes that draw the same outline have the same normal form.
pub fn normalize(shape: &NativeShape) -> NativeShape {
    match shape {
        NativeShape::Polygon(rings) => {
            let mut ring = rings.first().cloned().unwrap_or_default();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            NativeShape::Polygon(vec![ring])
        }
        NativeShape::Rectangle {
            south_west,
            north_east,
        } => {
            let south = south_west.lat.min(north_east.lat);
            let north = south_west.lat.max(north_east.lat);
            let west = south_west.lng.min(north_east.lng);
            let east = south_west.lng.max(north_east.lng);
            NativeShape::Polygon(vec![vec![
                LatLng::new(south, west),
                LatLng::new(north, west),
                LatLng::new(north, east),
                LatLng::new(south, east),
            ]])
        }
        other => other.clone(),
    }
}
