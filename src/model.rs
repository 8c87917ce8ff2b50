use std::collections::HashMap;
use std::fmt;

use crate::wkt;

/// Smallest representable positive `f64`, used to fill a bounding box that
/// was never read from a document.
pub const SENTINEL_COORDINATE: f64 = 4.9E-324;

/// A single 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryPoint {
    pub x: f64,
    pub y: f64,
}

impl GeometryPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GeometryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeometryKind {
    Point,
    #[default]
    LineString,
    Polygon,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::LineString => "LINESTRING",
            GeometryKind::Polygon => "POLYGON",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry of one feature. The WKT text is derived from `points` on demand.
///
/// Points read from separate coordinate blocks (the members of a
/// `gml:MultiLineString`, say) stay separate parts so the rendered WKT never
/// joins them into one path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    kind: GeometryKind,
    points: Vec<GeometryPoint>,
    /// Start index into `points` of every part.
    part_starts: Vec<usize>,
}

impl Geometry {
    pub fn new(kind: GeometryKind, points: Vec<GeometryPoint>) -> Self {
        Self::from_parts(kind, vec![points])
    }

    /// Builds a geometry from several coordinate blocks. Empty blocks are dropped.
    pub fn from_parts(kind: GeometryKind, parts: Vec<Vec<GeometryPoint>>) -> Self {
        let mut points = Vec::new();
        let mut part_starts = Vec::new();
        for part in parts.into_iter().filter(|part| !part.is_empty()) {
            part_starts.push(points.len());
            points.extend(part);
        }
        Self {
            kind,
            points,
            part_starts,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn points(&self) -> &[GeometryPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn parts(&self) -> Vec<&[GeometryPoint]> {
        self.part_starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = self
                    .part_starts
                    .get(i + 1)
                    .copied()
                    .unwrap_or(self.points.len());
                &self.points[start..end]
            })
            .collect()
    }

    pub fn wkt(&self) -> String {
        wkt::render_parts(&self.parts(), self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: GeometryPoint,
    pub max: GeometryPoint,
}

impl BoundingBox {
    pub fn new(min: GeometryPoint, max: GeometryPoint) -> Self {
        Self { min, max }
    }

    /// `true` while the box still holds the default sentinel corners.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::default()
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        let corner = GeometryPoint::new(SENTINEL_COORDINATE, SENTINEL_COORDINATE);
        Self {
            min: corner,
            max: corner,
        }
    }
}

/// One parsed `gml:featureMember`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureRecord {
    pub fid: Option<String>,
    pub context_id: Option<String>,
    /// Every requested attribute name is present as a key; `None` when the
    /// feature had no such element.
    pub attributes: HashMap<String, Option<String>>,
    pub geometry: Geometry,
}

impl FeatureRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|value| value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub bounding_box: BoundingBox,
    pub features: Vec<FeatureRecord>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
