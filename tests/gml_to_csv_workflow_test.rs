use gml_features::{parse_gml_file, parse_gml_reader, CsvWriter, GeometryKind, ParseOptions};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

// ogr2ogr -f GML で書き出した形式に近いサンプル
const SITES_GML: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<ogr:FeatureCollection
     xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
     xsi:schemaLocation="http://ogr.maptools.org/ sites.xsd"
     xmlns:ogr="http://ogr.maptools.org/"
     xmlns:gml="http://www.opengis.net/gml">
  <gml:boundedBy>
    <gml:Box>
      <gml:coord><gml:X>408000</gml:X><gml:Y>168000</gml:Y></gml:coord>
      <gml:coord><gml:X>411000</gml:X><gml:Y>170500</gml:Y></gml:coord>
    </gml:Box>
  </gml:boundedBy>

  <gml:featureMember>
    <ogr:sites fid="sites.0">
      <ogr:geometryProperty><gml:Point srsName="EPSG:27700"><gml:coordinates>410250.5,169980.25</gml:coordinates></gml:Point></ogr:geometryProperty>
      <ogr:siteName>Avebury</ogr:siteName>
      <ogr:material>sarsen</ogr:material>
    </ogr:sites>
  </gml:featureMember>
  <gml:featureMember>
    <ogr:sites fid="sites.1">
      <ogr:geometryProperty><gml:Polygon srsName="EPSG:27700"><gml:outerBoundaryIs><gml:LinearRing><gml:coordinates>408000,168000 409000,168000 409000,169000 408000,168000</gml:coordinates></gml:LinearRing></gml:outerBoundaryIs></gml:Polygon></ogr:geometryProperty>
      <ogr:siteName>Silbury Hill</ogr:siteName>
      <ogr:material>chalk</ogr:material>
    </ogr:sites>
  </gml:featureMember>
</ogr:FeatureCollection>
"#;

fn options() -> ParseOptions {
    ParseOptions::new("siteName", vec!["material".to_string()])
}

#[test]
fn test_full_gml_to_csv_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let gml_path = temp_dir.path().join("sites.gml");
    let csv_path = temp_dir.path().join("sites.csv");
    fs::write(&gml_path, SITES_GML).unwrap();

    // 1. GMLを解析
    let collection = parse_gml_file(&gml_path, &options()).unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.features[0].geometry.kind(), GeometryKind::Point);
    assert_eq!(collection.features[1].geometry.kind(), GeometryKind::Polygon);
    assert_eq!(collection.bounding_box.min.x, 408000.0);
    assert_eq!(collection.bounding_box.max.y, 170500.0);

    // 2. CSVに書き出し
    CsvWriter::new()
        .write(&collection, &options(), &csv_path)
        .unwrap();

    // 3. 出力内容を確認
    let text = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "header + 2 rows expected, got: {}", text);
    assert_eq!(lines[0], r#""FID","CONTEXT_ID","material","GEOMETRY""#);
    assert_eq!(
        lines[1],
        r#""sites.0","Avebury","sarsen","POINT(410250.5 169980.25)""#
    );
    assert_eq!(
        lines[2],
        r#""sites.1","Silbury Hill","chalk","POLYGON((408000 168000, 409000 168000, 409000 169000, 408000 168000))""#
    );
}

#[test]
fn test_parse_from_reader_matches_file() {
    let temp_dir = TempDir::new().unwrap();
    let gml_path = temp_dir.path().join("sites.gml");
    fs::write(&gml_path, SITES_GML).unwrap();

    let from_file = parse_gml_file(&gml_path, &options()).unwrap();
    let from_reader = parse_gml_reader(Cursor::new(SITES_GML.as_bytes()), &options()).unwrap();
    assert_eq!(from_file, from_reader);
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = parse_gml_file(&temp_dir.path().join("missing.gml"), &options());
    assert!(result.is_err());
}
