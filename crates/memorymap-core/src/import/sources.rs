//! Readers for GeoJSON, KML, KMZ and CSV files.
//!
//! Each reader turns a whole file into an [`ImportBatch`]. Problems with
//! individual entries become warnings on the batch; only a file that cannot
//! be read at all is an error.

use super::{ImportBatch, ImportRecord};
use crate::geometry::{Geometry, Position};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value, json};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Category given to features read from KML and CSV.
pub const IMPORTED_CATEGORY: &str = "imported";

/// Placemark descriptions longer than this are cut.
pub const MAX_KML_DESCRIPTION_LEN: usize = 1000;

/// Whole-file read failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Invalid JSON: {0}")]
    Json(String),
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),
    #[error("Failed to parse KML: {0}")]
    Kml(String),
    #[error("Invalid KMZ file: {0}")]
    Kmz(String),
    #[error("CSV file is empty or has no headers")]
    EmptyCsv,
    #[error("{role} column '{column}' not found. Available: {available}")]
    MissingColumn {
        role: &'static str,
        column: String,
        available: String,
    },
    #[error("Failed to parse CSV: {0}")]
    Csv(String),
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    Kml,
    Kmz,
    Csv,
}

impl SourceFormat {
    /// Detect the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Some(SourceFormat::GeoJson),
            "kml" => Some(SourceFormat::Kml),
            "kmz" => Some(SourceFormat::Kmz),
            "csv" => Some(SourceFormat::Csv),
            _ => None,
        }
    }
}

/// Column names used to read points from CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub lat: String,
    pub lng: String,
    pub name: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            lat: "lat".to_string(),
            lng: "lng".to_string(),
            name: "name".to_string(),
        }
    }
}

/// Read a file, choosing the reader from its extension.
///
/// A `.kml` file that is really a zip archive is read as KMZ.
pub fn parse_file(path: &Path) -> Result<ImportBatch, SourceError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format =
        SourceFormat::from_file_name(&name).ok_or_else(|| SourceError::UnsupportedFormat(name.clone()))?;
    let bytes = std::fs::read(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::info!("Reading {} as {:?}", path.display(), format);

    if format == SourceFormat::Kmz || (format == SourceFormat::Kml && bytes.starts_with(b"PK\x03\x04")) {
        return parse_kmz(&bytes);
    }
    let text = String::from_utf8(bytes).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    match format {
        SourceFormat::GeoJson => parse_geojson(&text),
        SourceFormat::Kml | SourceFormat::Kmz => parse_kml(&text),
        SourceFormat::Csv => parse_csv(&text, &CsvColumns::default()),
    }
}

// --- GeoJSON ---

/// Read a FeatureCollection, a single Feature or a bare geometry.
pub fn parse_geojson(text: &str) -> Result<ImportBatch, SourceError> {
    let root: Value = serde_json::from_str(text).map_err(|e| SourceError::Json(e.to_string()))?;
    let kind = root
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SourceError::GeoJson("GeoJSON must be an object with a type".to_string()))?;

    let features = match kind.as_str() {
        "FeatureCollection" => root
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| SourceError::GeoJson("FeatureCollection must have a 'features' array".to_string()))?,
        "Feature" => vec![root],
        "Point" | "LineString" | "Polygon" | "MultiLineString" | "MultiPolygon" => {
            vec![json!({"type": "Feature", "geometry": root, "properties": {}})]
        }
        other => return Err(SourceError::GeoJson(format!("Unsupported GeoJSON type: {}", other))),
    };

    let mut batch = ImportBatch::default();
    for (index, feature) in features.iter().enumerate() {
        let n = index + 1;
        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
            batch.warnings.push(format!("Feature {}: not a GeoJSON Feature", n));
            continue;
        }
        let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
            batch.warnings.push(format!("Feature {}: missing geometry", n));
            continue;
        };
        let Some(geometry) = geojson_geometry(geometry, n, &mut batch.warnings) else {
            continue;
        };
        let attributes = feature
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        batch.records.push(ImportRecord {
            title: None,
            geometry,
            attributes,
        });
    }
    Ok(batch)
}

fn position(value: &Value) -> Option<Position> {
    let coords = value.as_array()?;
    match (coords.first()?.as_f64(), coords.get(1)?.as_f64()) {
        (Some(lng), Some(lat)) => Some([lng, lat]),
        _ => None,
    }
}

fn positions(value: &Value) -> Option<Vec<Position>> {
    value.as_array()?.iter().map(position).collect()
}

fn rings(value: &Value) -> Option<Vec<Vec<Position>>> {
    value.as_array()?.iter().map(positions).collect()
}

fn geojson_geometry(geometry: &Value, n: usize, warnings: &mut Vec<String>) -> Option<Geometry> {
    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or_default();
    let coordinates = geometry.get("coordinates").unwrap_or(&Value::Null);

    let decoded = match kind.to_ascii_lowercase().as_str() {
        "point" => position(coordinates).map(Geometry::Point),
        "linestring" => positions(coordinates).map(Geometry::LineString),
        "polygon" => rings(coordinates).map(Geometry::Polygon),
        "multilinestring" => {
            warnings.push(format!("Feature {}: MultiLineString reduced to its first line", n));
            coordinates
                .as_array()
                .and_then(|lines| lines.first())
                .and_then(positions)
                .map(Geometry::LineString)
        }
        "multipolygon" => {
            warnings.push(format!("Feature {}: MultiPolygon reduced to its first polygon", n));
            coordinates
                .as_array()
                .and_then(|polygons| polygons.first())
                .and_then(rings)
                .map(Geometry::Polygon)
        }
        _ => {
            warnings.push(format!("Unsupported geometry type: {}", kind));
            return None;
        }
    };
    if decoded.is_none() {
        warnings.push(format!("Feature {}: invalid {} coordinates", n, kind));
    }
    decoded
}

// --- KML ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Point,
    Line,
    Polygon,
}

#[derive(Default)]
struct Placemark {
    name: String,
    description: String,
    point: Option<String>,
    line: Option<String>,
    polygon: Option<String>,
}

impl Placemark {
    fn slot(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::Point => &mut self.point,
            Slot::Line => &mut self.line,
            Slot::Polygon => &mut self.polygon,
        }
    }

    fn geometry(&self) -> Option<Geometry> {
        if let Some(point) = self.point.as_deref().and_then(kml_coordinates) {
            return point.first().copied().map(Geometry::Point);
        }
        if let Some(line) = self.line.as_deref().and_then(kml_coordinates) {
            return Some(Geometry::LineString(line));
        }
        self.polygon
            .as_deref()
            .and_then(kml_coordinates)
            .map(Geometry::polygon_from_ring)
    }

    fn into_record(self, warnings: &mut Vec<String>) -> Option<ImportRecord> {
        let name = match self.name.trim() {
            "" => "Unnamed".to_string(),
            name => name.to_string(),
        };
        let Some(geometry) = self.geometry() else {
            warnings.push(format!("Placemark '{}' has no valid geometry", name));
            return None;
        };
        let mut description = self.description.trim().to_string();
        if description.chars().count() > MAX_KML_DESCRIPTION_LEN {
            description = description.chars().take(MAX_KML_DESCRIPTION_LEN).collect();
            warnings.push(format!(
                "Placemark '{}': description truncated to {} characters",
                name, MAX_KML_DESCRIPTION_LEN
            ));
        }
        let mut attributes = Map::new();
        attributes.insert("description".to_string(), Value::from(description));
        attributes.insert("category".to_string(), Value::from(IMPORTED_CATEGORY));
        Some(ImportRecord {
            title: Some(name),
            geometry,
            attributes,
        })
    }
}

/// Parse `lng,lat[,alt]` tuples separated by whitespace.
fn kml_coordinates(text: &str) -> Option<Vec<Position>> {
    let coords: Option<Vec<Position>> = text
        .split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lng = parts.next()?.trim().parse().ok()?;
            let lat = parts.next()?.trim().parse().ok()?;
            Some([lng, lat])
        })
        .collect();
    coords.filter(|c| !c.is_empty())
}

/// Read every Placemark of a KML document, at any depth.
pub fn parse_kml(text: &str) -> Result<ImportBatch, SourceError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut batch = ImportBatch::default();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<Placemark> = None;
    let mut target: Option<Slot> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SourceError::Kml(format!("at byte {}: {}", reader.buffer_position(), e)))?;
        match event {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "Placemark" => current = Some(Placemark::default()),
                    "coordinates" => {
                        let slot = if stack.iter().any(|t| t == "Point") {
                            Some(Slot::Point)
                        } else if stack.iter().any(|t| t == "LineString") {
                            Some(Slot::Line)
                        } else if stack.iter().any(|t| t == "outerBoundaryIs") {
                            Some(Slot::Polygon)
                        } else {
                            None
                        };
                        // Only the first geometry of each kind counts.
                        target = match (current.as_mut(), slot) {
                            (Some(placemark), Some(slot)) => {
                                let buf = placemark.slot(slot);
                                if buf.is_none() {
                                    *buf = Some(String::new());
                                    Some(slot)
                                } else {
                                    None
                                }
                            }
                            _ => None,
                        };
                    }
                    _ => {}
                }
                stack.push(tag);
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if tag == "Placemark" {
                    if let Some(placemark) = current.take() {
                        batch.records.extend(placemark.into_record(&mut batch.warnings));
                    }
                } else if tag == "coordinates" {
                    target = None;
                }
                stack.pop();
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| SourceError::Kml(e.to_string()))?;
                append_text(&stack, current.as_mut(), target, &text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&stack, current.as_mut(), target, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if batch.records.is_empty() && batch.warnings.is_empty() {
        log::debug!("KML document has no placemarks");
    }
    Ok(batch)
}

fn append_text(stack: &[String], placemark: Option<&mut Placemark>, target: Option<Slot>, text: &str) {
    let Some(placemark) = placemark else {
        return;
    };
    if let Some(slot) = target {
        if let Some(buf) = placemark.slot(slot) {
            buf.push(' ');
            buf.push_str(text);
        }
        return;
    }
    let parent_is_placemark = stack.len() >= 2 && stack[stack.len() - 2] == "Placemark";
    match stack.last().map(String::as_str) {
        Some("name") if parent_is_placemark => placemark.name.push_str(text),
        Some("description") if parent_is_placemark => placemark.description.push_str(text),
        _ => {}
    }
}

/// Read the first `.kml` document inside a KMZ archive.
pub fn parse_kmz(bytes: &[u8]) -> Result<ImportBatch, SourceError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| SourceError::Kmz(e.to_string()))?;

    let entry_name = archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(".kml"))
        .map(str::to_string)
        .ok_or_else(|| SourceError::Kmz("No KML file found in KMZ archive".to_string()))?;

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|e| SourceError::Kmz(e.to_string()))?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| SourceError::Kmz(format!("{}: {}", entry_name, e)))?;
    parse_kml(&text)
}

// --- CSV ---

/// Read one point per CSV row.
pub fn parse_csv(text: &str, columns: &CsvColumns) -> Result<ImportBatch, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SourceError::Csv(e.to_string()))?
        .clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(SourceError::EmptyCsv);
    }
    let find = |role: &'static str, column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SourceError::MissingColumn {
                role,
                column: column.to_string(),
                available: headers.iter().collect::<Vec<_>>().join(", "),
            })
    };
    let lat_idx = find("Latitude", &columns.lat)?;
    let lng_idx = find("Longitude", &columns.lng)?;
    let name_idx = headers.iter().position(|h| h == columns.name);

    let mut batch = ImportBatch::default();
    for (index, row) in reader.records().enumerate() {
        let n = index + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                batch.warnings.push(format!("Row {}: {}", n, e));
                continue;
            }
        };
        match csv_point(&row, lat_idx, lng_idx) {
            Ok((lat, lng)) => {
                let title = name_idx
                    .and_then(|i| row.get(i))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Point {}", n));
                let mut attributes = Map::new();
                attributes.insert(
                    "description".to_string(),
                    Value::from(format!("Imported from CSV: lat={}, lng={}", lat, lng)),
                );
                attributes.insert("category".to_string(), Value::from(IMPORTED_CATEGORY));
                batch.records.push(ImportRecord {
                    title: Some(title),
                    geometry: Geometry::Point([lng, lat]),
                    attributes,
                });
            }
            Err(reason) => batch.warnings.push(format!("Row {}: {}", n, reason)),
        }
    }
    Ok(batch)
}

fn csv_point(row: &csv::StringRecord, lat_idx: usize, lng_idx: usize) -> Result<(f64, f64), String> {
    let parse = |idx: usize, label: &str| -> Result<f64, String> {
        let raw = row.get(idx).unwrap_or_default();
        raw.parse::<f64>()
            .map_err(|_| format!("Invalid coordinates: {} '{}' is not a number", label, raw))
    };
    let lat = parse(lat_idx, "latitude")?;
    let lng = parse(lng_idx, "longitude")?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Latitude {} out of range (-90 to 90)", lat));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(format!("Longitude {} out of range (-180 to 180)", lng));
    }
    Ok((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(SourceFormat::from_file_name("trip.GeoJSON"), Some(SourceFormat::GeoJson));
        assert_eq!(SourceFormat::from_file_name("trip.json"), Some(SourceFormat::GeoJson));
        assert_eq!(SourceFormat::from_file_name("doc.kml"), Some(SourceFormat::Kml));
        assert_eq!(SourceFormat::from_file_name("doc.kmz"), Some(SourceFormat::Kmz));
        assert_eq!(SourceFormat::from_file_name("points.csv"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_file_name("notes.txt"), None);
        assert_eq!(SourceFormat::from_file_name("README"), None);
    }

    #[test]
    fn test_geojson_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Pier"},
                 "geometry": {"type": "Point", "coordinates": [-122.39, 37.79, 12.0]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "GeometryCollection", "geometries": []}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let batch = parse_geojson(text).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].geometry, Geometry::Point([-122.39, 37.79]));
        assert_eq!(batch.records[0].attributes["name"], "Pier");
        assert_eq!(
            batch.records[1].geometry,
            Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0]])
        );
        assert!(batch.warnings.iter().any(|w| w == "Unsupported geometry type: GeometryCollection"));
        assert!(batch.warnings.iter().any(|w| w.contains("missing geometry")));
    }

    #[test]
    fn test_geojson_single_feature_and_bare_geometry() {
        let feature = r#"{"type": "Feature", "properties": {"title": "A"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        assert_eq!(parse_geojson(feature).unwrap().records.len(), 1);

        let bare = r#"{"type": "Point", "coordinates": [1, 2]}"#;
        let batch = parse_geojson(bare).unwrap();
        assert_eq!(batch.records[0].geometry, Geometry::Point([1.0, 2.0]));
    }

    #[test]
    fn test_geojson_errors() {
        assert!(matches!(parse_geojson("{"), Err(SourceError::Json(_))));
        assert!(matches!(
            parse_geojson(r#"{"type": "Topology"}"#),
            Err(SourceError::GeoJson(_))
        ));
        assert!(matches!(
            parse_geojson(r#"{"type": "FeatureCollection"}"#),
            Err(SourceError::GeoJson(_))
        ));
    }

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Trip</name>
    <Folder>
      <Placemark>
        <name>Ferry Building</name>
        <description><![CDATA[Lunch &amp; oysters]]></description>
        <Point><coordinates>-122.3937,37.7955,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Walk</name>
        <LineString>
          <coordinates>
            -122.40,37.79,0 -122.41,37.80,0
          </coordinates>
        </LineString>
      </Placemark>
    </Folder>
    <Placemark>
      <Polygon>
        <outerBoundaryIs><LinearRing>
          <coordinates>0,0 1,0 1,1</coordinates>
        </LinearRing></outerBoundaryIs>
        <innerBoundaryIs><LinearRing>
          <coordinates>0.2,0.2 0.3,0.2 0.3,0.3</coordinates>
        </LinearRing></innerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <name>Nowhere</name>
    </Placemark>
  </Document>
</kml>"#;

    #[test]
    fn test_kml_placemarks() {
        let batch = parse_kml(KML).unwrap();

        assert_eq!(batch.records.len(), 3);
        let ferry = &batch.records[0];
        assert_eq!(ferry.title.as_deref(), Some("Ferry Building"));
        assert_eq!(ferry.geometry, Geometry::Point([-122.3937, 37.7955]));
        assert_eq!(ferry.attributes["description"], "Lunch &amp; oysters");
        assert_eq!(ferry.attributes["category"], IMPORTED_CATEGORY);

        assert_eq!(
            batch.records[1].geometry,
            Geometry::LineString(vec![[-122.40, 37.79], [-122.41, 37.80]])
        );

        let area = &batch.records[2];
        assert_eq!(area.title.as_deref(), Some("Unnamed"));
        assert_eq!(
            area.geometry,
            Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]])
        );

        assert_eq!(batch.warnings, vec!["Placemark 'Nowhere' has no valid geometry".to_string()]);
    }

    #[test]
    fn test_kml_long_description_is_cut() {
        let long = "é".repeat(MAX_KML_DESCRIPTION_LEN + 50);
        let kml = format!(
            "<kml><Placemark><name>Pier</name><description>{}</description>\
             <Point><coordinates>1,2</coordinates></Point></Placemark></kml>",
            long
        );
        let batch = parse_kml(&kml).unwrap();

        let description = batch.records[0].attributes["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), MAX_KML_DESCRIPTION_LEN);
        assert_eq!(
            batch.warnings,
            vec!["Placemark 'Pier': description truncated to 1000 characters".to_string()]
        );
    }

    #[test]
    fn test_kml_bad_xml() {
        assert!(matches!(parse_kml("<kml><Placemark></kml>"), Err(SourceError::Kml(_))));
    }

    fn kmz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            for (name, content) in entries {
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored);
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_kmz_reads_first_kml() {
        let bytes = kmz_bytes(&[("images/readme.txt", "hi"), ("doc.kml", KML)]);
        let batch = parse_kmz(&bytes).unwrap();
        assert_eq!(batch.records.len(), 3);
    }

    #[test]
    fn test_kmz_without_kml() {
        let bytes = kmz_bytes(&[("readme.txt", "hi")]);
        assert!(matches!(parse_kmz(&bytes), Err(SourceError::Kmz(_))));
        assert!(matches!(parse_kmz(b"not a zip"), Err(SourceError::Kmz(_))));
    }

    #[test]
    fn test_csv_points() {
        let text = "name,lat,lng\nPier,37.79,-122.39\n,37.80,-122.40\nBad,north,-122.4\nFar,95,10\n";
        let batch = parse_csv(text, &CsvColumns::default()).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].title.as_deref(), Some("Pier"));
        assert_eq!(batch.records[0].geometry, Geometry::Point([-122.39, 37.79]));
        assert_eq!(
            batch.records[0].attributes["description"],
            "Imported from CSV: lat=37.79, lng=-122.39"
        );
        assert_eq!(batch.records[1].title.as_deref(), Some("Point 2"));

        assert_eq!(batch.warnings.len(), 2);
        assert!(batch.warnings[0].starts_with("Row 3: Invalid coordinates"));
        assert_eq!(batch.warnings[1], "Row 4: Latitude 95 out of range (-90 to 90)");
    }

    #[test]
    fn test_csv_custom_columns() {
        let text = "y,x,label\n1.5,2.5,Spot\n";
        let columns = CsvColumns {
            lat: "y".to_string(),
            lng: "x".to_string(),
            name: "label".to_string(),
        };
        let batch = parse_csv(text, &columns).unwrap();
        assert_eq!(batch.records[0].geometry, Geometry::Point([2.5, 1.5]));
        assert_eq!(batch.records[0].title.as_deref(), Some("Spot"));
    }

    #[test]
    fn test_csv_missing_column() {
        let err = parse_csv("name,latitude,lng\n", &CsvColumns::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Latitude column 'lat' not found. Available: name, latitude, lng"
        );
        assert!(matches!(parse_csv("", &CsvColumns::default()), Err(SourceError::EmptyCsv)));
    }

    #[test]
    fn test_parse_file_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("points.csv");
        std::fs::write(&csv_path, "lat,lng\n1,2\n").unwrap();
        assert_eq!(parse_file(&csv_path).unwrap().records.len(), 1);

        // A zipped document with a .kml name is still read.
        let kml_path = dir.path().join("zipped.kml");
        std::fs::write(&kml_path, kmz_bytes(&[("doc.kml", KML)])).unwrap();
        assert_eq!(parse_file(&kml_path).unwrap().records.len(), 3);

        let txt_path = dir.path().join("notes.txt");
        std::fs::write(&txt_path, "x").unwrap();
        assert!(matches!(parse_file(&txt_path), Err(SourceError::UnsupportedFormat(_))));
    }
}
