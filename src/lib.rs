pub mod dom;
pub mod error;
pub mod model;
pub mod ogr;
pub mod parser;
pub mod wkt;
pub mod writer;

pub use dom::{Document, Element};
pub use error::{GmlError, Result};
pub use model::{BoundingBox, FeatureCollection, FeatureRecord, Geometry, GeometryKind, GeometryPoint};
pub use ogr::Ogr2Ogr;
pub use parser::{parse_gml_file, parse_gml_reader, parse_gml_str, GmlParser, ParseOptions};
pub use writer::CsvWriter;
