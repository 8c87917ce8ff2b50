//! Conversion of an OGR GML feature collection into a [`FeatureCollection`].
//!
//! The parser understands the GML 2 subset written by `ogr2ogr -f GML`:
//!
//! ```xml
//! <ogr:FeatureCollection>
//!   <gml:boundedBy><gml:Box>
//!     <gml:coord><gml:X>..</gml:X><gml:Y>..</gml:Y></gml:coord>
//!     <gml:coord><gml:X>..</gml:X><gml:Y>..</gml:Y></gml:coord>
//!   </gml:Box></gml:boundedBy>
//!   <gml:featureMember>
//!     <ogr:layer fid="layer.0">
//!       <ogr:geometryProperty>
//!         <gml:Polygon><gml:outerBoundaryIs><gml:LinearRing>
//!           <gml:coordinates>x1,y1 x2,y2 ..</gml:coordinates>
//!         </gml:LinearRing></gml:outerBoundaryIs></gml:Polygon>
//!       </ogr:geometryProperty>
//!       <ogr:name>..</ogr:name>
//!     </ogr:layer>
//!   </gml:featureMember>
//! </ogr:FeatureCollection>
//! ```
//!
//! The layer element wrapped by each `gml:featureMember` is named after the
//! source layer, so it is located as the member's first child element.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::dom::{Document, Element};
use crate::error::{GmlError, Result};
use crate::model::{BoundingBox, FeatureCollection, FeatureRecord, Geometry, GeometryKind, GeometryPoint};
use crate::wkt;

pub const DEFAULT_PREFIX: &str = "ogr";

const FEATURE_MEMBER: &str = "gml:featureMember";
const BOUNDED_BY: &str = "gml:boundedBy";
const BOX: &str = "gml:Box";
const COORD: &str = "gml:coord";
const COORD_X: &str = "gml:X";
const COORD_Y: &str = "gml:Y";
const LINE_STRING: &str = "gml:LineString";
const POLYGON: &str = "gml:Polygon";
const POINT: &str = "gml:Point";
const COORDINATES: &str = "gml:coordinates";
const FID: &str = "fid";

/// Which values to pull out of every feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Local name of the element holding the context identifier.
    pub context_attribute: String,
    /// Local names of the attribute elements to extract, in output order.
    pub attributes: Vec<String>,
    /// Namespace prefix of the layer schema elements.
    pub prefix: String,
}

impl ParseOptions {
    pub fn new(context_attribute: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            context_attribute: context_attribute.into(),
            attributes,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn qualified(&self, local_name: &str) -> String {
        format!("{}:{}", self.prefix, local_name)
    }
}

pub struct GmlParser {
    options: ParseOptions,
    collection_tag: String,
    geometry_property_tag: String,
    context_tag: String,
    attribute_tags: Vec<(String, String)>,
}

impl GmlParser {
    pub fn new(options: ParseOptions) -> Self {
        let attribute_tags = options
            .attributes
            .iter()
            .map(|name| (name.clone(), options.qualified(name)))
            .collect();

        Self {
            collection_tag: options.qualified("FeatureCollection"),
            geometry_property_tag: options.qualified("geometryProperty"),
            context_tag: options.qualified(&options.context_attribute),
            attribute_tags,
            options,
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Builds a [`FeatureCollection`] from `document`.
    ///
    /// Missing attribute or geometry elements leave the matching field empty.
    /// A feature whose coordinates cannot be read is left out of the result
    /// and reported with `warn!`.
    pub fn parse(&self, document: &Document) -> FeatureCollection {
        let mut collection = FeatureCollection::default();
        let mut collections_found = 0;
        let mut boxes_found = 0;
        let mut rejected = 0;

        for feature_collection in document.elements_named(&self.collection_tag) {
            collections_found += 1;

            for bounded_by in feature_collection.descendants_named(BOUNDED_BY) {
                for gml_box in bounded_by.descendants_named(BOX) {
                    match read_box(gml_box) {
                        Ok(bbox) => {
                            boxes_found += 1;
                            if boxes_found > 1 {
                                warn!(
                                    "Multiple <{}> elements found; replacing bounding box {:?} with {:?}",
                                    BOX, collection.bounding_box, bbox
                                );
                            }
                            collection.bounding_box = bbox;
                        }
                        Err(e) => warn!("Skipping unreadable <{}>: {}", BOX, e),
                    }
                }
            }

            for (index, member) in feature_collection
                .descendants_named(FEATURE_MEMBER)
                .enumerate()
            {
                match self.parse_member(member) {
                    Ok(record) => collection.features.push(record),
                    Err(e) => {
                        rejected += 1;
                        warn!("Rejected feature member #{}: {}", index, e);
                    }
                }
            }
        }

        if collections_found == 0 {
            warn!(
                "No <{}> element found in document rooted at <{}>",
                self.collection_tag,
                document.root().name()
            );
        }

        info!(
            "Parsed {} features ({} rejected)",
            collection.features.len(),
            rejected
        );
        collection
    }

    fn parse_member(&self, member: &Element) -> Result<FeatureRecord> {
        let feature = member.first_child_element();
        if feature.is_none() {
            warn!("<{}> without a wrapped feature element", FEATURE_MEMBER);
        }

        let fid = feature
            .and_then(|f| f.attribute(FID))
            .map(str::to_string);

        let geometry = match feature.and_then(|f| f.find(&self.geometry_property_tag)) {
            Some(property) => match read_geometry(property) {
                Ok(geometry) => geometry,
                Err(e) => {
                    warn!("Feature {:?} has unreadable coordinates", fid);
                    return Err(e);
                }
            },
            None => {
                debug!("Feature {:?} has no <{}>", fid, self.geometry_property_tag);
                Geometry::default()
            }
        };

        let context_id = feature
            .and_then(|f| f.single_value(&self.context_tag))
            .map(str::to_string);

        let attributes: HashMap<String, Option<String>> = self
            .attribute_tags
            .iter()
            .map(|(name, tag)| {
                let value = feature
                    .and_then(|f| f.single_value(tag))
                    .map(str::to_string);
                (name.clone(), value)
            })
            .collect();

        debug!(
            "Feature {:?}: {} with {} points",
            fid,
            geometry.kind(),
            geometry.points().len()
        );

        Ok(FeatureRecord {
            fid,
            context_id,
            attributes,
            geometry,
        })
    }
}

/// Reads the two `gml:coord` corners of a `gml:Box`.
fn read_box(gml_box: &Element) -> Result<BoundingBox> {
    let corners: Vec<&Element> = gml_box.descendants_named(COORD).collect();
    if corners.len() != 2 {
        return Err(GmlError::InvalidCoordinate {
            token: BOX.to_string(),
            reason: format!("expected 2 <{}> corners, found {}", COORD, corners.len()),
        });
    }

    let min = read_coord(corners[0])?;
    let max = read_coord(corners[1])?;
    Ok(BoundingBox::new(min, max))
}

fn read_coord(coord: &Element) -> Result<GeometryPoint> {
    let x = read_ordinate(coord, COORD_X)?;
    let y = read_ordinate(coord, COORD_Y)?;
    Ok(GeometryPoint::new(x, y))
}

fn read_ordinate(coord: &Element, tag: &str) -> Result<f64> {
    let text = coord
        .single_value(tag)
        .ok_or_else(|| GmlError::InvalidCoordinate {
            token: String::new(),
            reason: format!("missing <{}>", tag),
        })?;

    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(GmlError::InvalidCoordinate {
            token: text.to_string(),
            reason: "not a finite number".to_string(),
        }),
        Err(e) => Err(GmlError::InvalidCoordinate {
            token: text.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Classifies the geometry under a geometry property and collects its points.
///
/// Line strings take priority over polygons, which take priority over points.
fn read_geometry(property: &Element) -> Result<Geometry> {
    let line_strings: Vec<&Element> = property.descendants_named(LINE_STRING).collect();
    let polygon = property.find(POLYGON);

    let (kind, sources): (GeometryKind, Vec<&Element>) = if !line_strings.is_empty() {
        if polygon.is_some() {
            warn!(
                "Geometry has both <{}> and <{}>; the polygon is ignored",
                LINE_STRING, POLYGON
            );
        }
        (GeometryKind::LineString, line_strings)
    } else if let Some(polygon) = polygon {
        // outer boundary -> first ring
        let ring = polygon
            .first_child_element()
            .and_then(Element::first_child_element);
        (GeometryKind::Polygon, ring.into_iter().collect())
    } else {
        (GeometryKind::Point, property.descendants_named(POINT).collect())
    };

    // 座標ブロックごとに別パーツとして保持する
    let mut parts = Vec::with_capacity(sources.len());
    for source in sources {
        match source.single_value(COORDINATES) {
            Some(coordinates) => {
                let point_list = wkt::gml_to_wkt_point_list(coordinates);
                parts.push(wkt::parse_point_list(&point_list)?);
            }
            None => debug!("<{}> has no <{}>", source.name(), COORDINATES),
        }
    }

    Ok(Geometry::from_parts(kind, parts))
}

pub fn parse_gml_str(xml: &str, options: &ParseOptions) -> Result<FeatureCollection> {
    let document = Document::from_str(xml)?;
    Ok(GmlParser::new(options.clone()).parse(&document))
}

pub fn parse_gml_reader<R: BufRead>(reader: R, options: &ParseOptions) -> Result<FeatureCollection> {
    let document = Document::from_reader(reader)?;
    Ok(GmlParser::new(options.clone()).parse(&document))
}

pub fn parse_gml_file(path: &Path, options: &ParseOptions) -> Result<FeatureCollection> {
    debug!("Loading GML file: {:?}", path);
    let document = Document::from_path(path)?;
    Ok(GmlParser::new(options.clone()).parse(&document))
}
