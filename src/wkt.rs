//! Coordinate conversion between the GML `coordinates` text form and WKT.
//!
//! GML writes a point list as `x1,y1 x2,y2` while WKT expects `x1 y1,x2 y2`.
//! [`gml_to_wkt_point_list`] swaps the two separators, [`parse_point_list`]
//! reads the WKT form back into points and [`render`] / [`render_parts`]
//! produce the final geometry text.

use crate::error::{GmlError, Result};
use crate::model::{GeometryKind, GeometryPoint};

/// Swaps the X/Y separator (`,`) and the pair separator (` `) of a GML
/// coordinate string. Every other byte is kept as is.
pub fn gml_to_wkt_point_list(coordinates: &str) -> String {
    coordinates
        .chars()
        .map(|c| match c {
            ',' => ' ',
            ' ' => ',',
            other => other,
        })
        .collect()
}

/// Parses a WKT point list (`x1 y1,x2 y2`) into points.
///
/// Line breaks and tabs left over from pretty-printed GML are accepted
/// between pairs. Non-numeric, non-finite or three-dimensional tuples are
/// rejected.
pub fn parse_point_list(point_list: &str) -> Result<Vec<GeometryPoint>> {
    point_list
        .split(|c: char| c == ',' || c == '\n' || c == '\r' || c == '\t')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(parse_point)
        .collect()
}

fn parse_point(pair: &str) -> Result<GeometryPoint> {
    let parts: Vec<&str> = pair.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(GmlError::InvalidCoordinate {
            token: pair.to_string(),
            reason: format!("expected 2 ordinates, found {}", parts.len()),
        });
    }

    let x = parse_ordinate(parts[0])?;
    let y = parse_ordinate(parts[1])?;
    Ok(GeometryPoint::new(x, y))
}

fn parse_ordinate(token: &str) -> Result<f64> {
    let value: f64 = token.parse().map_err(|e: std::num::ParseFloatError| {
        GmlError::InvalidCoordinate {
            token: token.to_string(),
            reason: e.to_string(),
        }
    })?;

    if !value.is_finite() {
        return Err(GmlError::InvalidCoordinate {
            token: token.to_string(),
            reason: "not a finite number".to_string(),
        });
    }

    Ok(value)
}

/// Renders a complete WKT string for `points` of the given `kind`.
///
/// A point geometry holding several points is written as `MULTIPOINT`, and an
/// empty point list as `<KIND> EMPTY`.
pub fn render(points: &[GeometryPoint], kind: GeometryKind) -> String {
    if points.is_empty() {
        return format!("{} EMPTY", kind);
    }

    let list = point_list(points);

    match kind {
        GeometryKind::Point if points.len() == 1 => format!("POINT({})", list),
        GeometryKind::Point => format!("MULTIPOINT({})", list),
        GeometryKind::LineString => format!("LINESTRING({})", list),
        GeometryKind::Polygon => format!("POLYGON(({}))", list),
    }
}

/// Renders a geometry made of several coordinate blocks.
///
/// One block renders exactly like [`render`]. More blocks become
/// `MULTILINESTRING((..), (..))` or `MULTIPOLYGON(((..)), ((..)))`; points
/// from every block are written as one `MULTIPOINT`.
pub fn render_parts(parts: &[&[GeometryPoint]], kind: GeometryKind) -> String {
    match parts {
        [] => render(&[], kind),
        [single] => render(single, kind),
        _ => match kind {
            GeometryKind::Point => {
                let points: Vec<GeometryPoint> = parts.concat();
                render(&points, kind)
            }
            GeometryKind::LineString => format!("MULTILINESTRING({})", wrapped_lists(parts, "(", ")")),
            GeometryKind::Polygon => format!("MULTIPOLYGON({})", wrapped_lists(parts, "((", "))")),
        },
    }
}

fn point_list(points: &[GeometryPoint]) -> String {
    points
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn wrapped_lists(parts: &[&[GeometryPoint]], open: &str, close: &str) -> String {
    parts
        .iter()
        .map(|part| format!("{}{}{}", open, point_list(part), close))
        .collect::<Vec<_>>()
        .join(", ")
}
