//! Building footprint ingest and normalization.
//!
//! Turns a GeoJSON building layer into a clean list of `Building`s that are
//! safe to erode:
//!
//! - **Strict schema**: the height and slope columns must resolve, otherwise
//!   the whole load fails before any building is touched
//! - **Feature-level validation**: a feature with no polygon or unusable
//!   attributes is skipped and reported, keeping its positional id
//! - **Metric coordinates**: geographic inputs are projected to the working
//!   CRS; projected inputs pass through untouched

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson, JsonObject, JsonValue};

use crate::crs::{Reprojector, SpatialRef};
use crate::domain::{Building, BuildingFailure, FieldCandidates};
use crate::error::{AppError, ErrorKind, GeometryError};
use crate::io::fields::{ResolvedFields, resolve_fields};

/// Loader output: usable buildings, skipped features and reference systems.
#[derive(Debug, Clone)]
pub struct NormalizedBuildings {
    pub buildings: Vec<Building>,
    pub skipped: Vec<BuildingFailure>,
    /// Reference system declared by (or assumed for) the source.
    pub source_crs: SpatialRef,
    /// Reference system of `buildings` after normalization.
    pub working_crs: SpatialRef,
    pub fields: ResolvedFields,
}

impl NormalizedBuildings {
    pub fn features_read(&self) -> usize {
        self.buildings.len() + self.skipped.len()
    }
}

/// Load and normalize a building layer from disk.
///
/// `epsg_override` replaces whatever reference system the file declares.
pub fn load_buildings(
    path: &Path,
    candidates: &FieldCandidates,
    epsg_override: Option<u32>,
) -> Result<NormalizedBuildings, AppError> {
    if !path.exists() {
        return Err(AppError::not_found(format!("File not found: {}", path.display())));
    }
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::not_found(format!("Failed to open '{}': {e}", path.display())))?;

    tracing::info!(path = %path.display(), bytes = text.len(), "Loading building footprints");
    load_buildings_from_str(&text, candidates, epsg_override)
}

/// Load and normalize a building layer from GeoJSON text.
pub fn load_buildings_from_str(
    text: &str,
    candidates: &FieldCandidates,
    epsg_override: Option<u32>,
) -> Result<NormalizedBuildings, AppError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| AppError::new(ErrorKind::InvalidInput, format!("Invalid GeoJSON: {e}")))?;

    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(_) => {
            return Err(AppError::new(
                ErrorKind::InvalidInput,
                "Expected a FeatureCollection with attributes, found a bare geometry.",
            ));
        }
    };

    let schema = collect_schema(&features);
    let fields = resolve_fields(&schema, candidates)?;

    let source_crs = match epsg_override {
        Some(code) => SpatialRef::Epsg(code),
        None => declared_crs(foreign_members.as_ref())?,
    };
    let reprojector = Reprojector::for_source(source_crs)?;
    let working_crs = reprojector.as_ref().map(|r| r.target()).unwrap_or(source_crs);

    tracing::info!(
        features = features.len(),
        height_field = %fields.height,
        slope_field = %fields.slope,
        source_epsg = source_crs.epsg(),
        working_epsg = working_crs.epsg(),
        "Resolved building schema"
    );

    let mut buildings = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();

    for (id, feature) in features.iter().enumerate() {
        match normalize_feature(id, feature, &fields, reprojector.as_ref()) {
            Ok(building) => buildings.push(building),
            Err(e) => {
                tracing::warn!(building_id = id, error = %e, "Skipping feature");
                skipped.push(BuildingFailure {
                    building_id: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(NormalizedBuildings {
        buildings,
        skipped,
        source_crs,
        working_crs,
        fields,
    })
}

fn normalize_feature(
    id: usize,
    feature: &Feature,
    fields: &ResolvedFields,
    reprojector: Option<&Reprojector>,
) -> Result<Building, GeometryError> {
    let footprint = feature_footprint(feature)?;
    let height = numeric_property(feature, &fields.height)?;
    let slope_deg = numeric_property(feature, &fields.slope)?;

    let footprint = match reprojector {
        Some(r) => r.project(&footprint)?,
        None => footprint,
    };

    Ok(Building {
        id,
        footprint,
        height,
        slope_deg,
    })
}

fn feature_footprint(feature: &Feature) -> Result<MultiPolygon<f64>, GeometryError> {
    let geometry = feature.geometry.clone().ok_or(GeometryError::MissingGeometry)?;
    let geometry = geo::Geometry::<f64>::try_from(geometry)
        .map_err(|e| GeometryError::InvalidFootprint(e.to_string()))?;
    match geometry {
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        other => Err(GeometryError::NotPolygonal(geometry_type_name(&other).to_string())),
    }
}

fn geometry_type_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

/// Accepts JSON numbers and numeric strings.
fn numeric_property(feature: &Feature, field: &str) -> Result<f64, GeometryError> {
    let value = match feature.property(field) {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| GeometryError::MissingAttribute {
        field: field.to_string(),
    })
}

/// Union of property names across all features.
fn collect_schema(features: &[Feature]) -> BTreeSet<String> {
    features
        .iter()
        .filter_map(|f| f.properties.as_ref())
        .flat_map(|props| props.keys().cloned())
        .collect()
}

/// Read the legacy `crs` member; RFC 7946 files without one are CRS84.
fn declared_crs(foreign_members: Option<&JsonObject>) -> Result<SpatialRef, AppError> {
    let name = foreign_members
        .and_then(|m| m.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str());

    match name {
        Some(name) => SpatialRef::parse(name),
        None => Ok(SpatialRef::GEOJSON_DEFAULT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::Area;

    fn projected_collection(features: &str) -> String {
        format!(
            r#"{{
                "type": "FeatureCollection",
                "crs": {{ "type": "name", "properties": {{ "name": "urn:ogc:def:crs:EPSG::32632" }} }},
                "features": [{features}]
            }}"#
        )
    }

    fn square_feature(x0: f64, props: &str) -> String {
        format!(
            r#"{{
                "type": "Feature",
                "properties": {{ {props} }},
                "geometry": {{
                    "type": "Polygon",
                    "coordinates": [[[{x0}, 0], [{x1}, 0], [{x1}, 10], [{x0}, 10], [{x0}, 0]]]
                }}
            }}"#,
            x1 = x0 + 10.0
        )
    }

    #[test]
    fn loads_and_renames_attributes() {
        let text = projected_collection(&[
            square_feature(0.0, r#""ALTEZZA_VO": 12.5, "SLOPE": 30, "name": "a""#),
            square_feature(100.0, r#""ALTEZZA_VO": "8", "SLOPE": 20.0"#),
        ]
        .join(","));

        let loaded = load_buildings_from_str(&text, &FieldCandidates::default(), None).unwrap();
        assert_eq!(loaded.fields.height, "ALTEZZA_VO");
        assert_eq!(loaded.fields.slope, "SLOPE");
        assert_eq!(loaded.buildings.len(), 2);
        assert_eq!(loaded.buildings[0].height, 12.5);
        assert_eq!(loaded.buildings[0].slope_deg, 30.0);
        assert_eq!(loaded.buildings[1].height, 8.0);
        assert_eq!(loaded.buildings[1].id, 1);
        assert_eq!(loaded.working_crs, SpatialRef::Epsg(32632));
        assert_abs_diff_eq!(loaded.buildings[0].footprint.unsigned_area(), 100.0);
    }

    #[test]
    fn missing_fields_abort_the_load() {
        let text = projected_collection(&square_feature(0.0, r#""height": 5, "pitch": 30"#));
        let err = load_buildings_from_str(&text, &FieldCandidates::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.message().contains("SLOPE"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_buildings(
            Path::new("/definitely/not/here/buildings.geojson"),
            &FieldCandidates::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bad_features_are_skipped_with_their_index() {
        let point = r#"{
            "type": "Feature",
            "properties": { "height": 5, "slope": 30 },
            "geometry": { "type": "Point", "coordinates": [1, 2] }
        }"#;
        let text = projected_collection(&[
            square_feature(0.0, r#""height": 5, "slope": 30"#),
            point.to_string(),
            square_feature(50.0, r#""height": null, "slope": 30"#),
            square_feature(100.0, r#""height": 7, "slope": 15"#),
        ]
        .join(","));

        let loaded = load_buildings_from_str(&text, &FieldCandidates::default(), None).unwrap();
        let ids: Vec<usize> = loaded.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![0, 3]);
        let skipped: Vec<usize> = loaded.skipped.iter().map(|f| f.building_id).collect();
        assert_eq!(skipped, vec![1, 2]);
        assert!(loaded.skipped[0].reason.contains("Point"));
        assert_eq!(loaded.features_read(), 4);
    }

    #[test]
    fn files_without_crs_are_treated_as_wgs84_and_projected() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "height": 10, "slope": 30 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[9.0, 45.0], [9.0005, 45.0], [9.0005, 45.0005], [9.0, 45.0005], [9.0, 45.0]]]
                }
            }]
        }"#;
        let loaded = load_buildings_from_str(text, &FieldCandidates::default(), None).unwrap();
        assert_eq!(loaded.source_crs, SpatialRef::Crs84);
        assert_eq!(loaded.working_crs, SpatialRef::Epsg(32632));
        // Roughly 39 m x 56 m once in metres.
        let area = loaded.buildings[0].footprint.unsigned_area();
        assert!(area > 2_000.0 && area < 2_400.0, "area {area}");
    }

    #[test]
    fn unprojectable_feature_is_skipped_not_fatal() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "height": 10, "slope": 30 },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[9.0, 95.0], [9.0005, 95.0], [9.0005, 95.0005], [9.0, 95.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "height": 10, "slope": 30 },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[9.0, 45.0], [9.0005, 45.0], [9.0005, 45.0005], [9.0, 45.0005], [9.0, 45.0]]]
                    }
                }
            ]
        }"#;
        let loaded = load_buildings_from_str(text, &FieldCandidates::default(), None).unwrap();
        assert_eq!(loaded.buildings.len(), 1);
        assert_eq!(loaded.buildings[0].id, 1);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].building_id, 0);
        assert!(loaded.skipped[0].reason.contains("reprojected"));
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn non_wgs84_geographic_input_is_refused_without_proj() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:4258" } },
            "features": [{
                "type": "Feature",
                "properties": { "height": 10, "slope": 30 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[9.0, 45.0], [9.0005, 45.0], [9.0005, 45.0005], [9.0, 45.0005], [9.0, 45.0]]]
                }
            }]
        }"#;
        let err = load_buildings_from_str(text, &FieldCandidates::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn epsg_override_wins_over_declared_crs() {
        let text = projected_collection(&square_feature(0.0, r#""height": 5, "slope": 30"#));
        let loaded = load_buildings_from_str(&text, &FieldCandidates::default(), Some(3003)).unwrap();
        assert_eq!(loaded.source_crs, SpatialRef::Epsg(3003));
        assert_eq!(loaded.working_crs, SpatialRef::Epsg(3003));
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let text = r#"{ "type": "Point", "coordinates": [0, 0] }"#;
        let err = load_buildings_from_str(text, &FieldCandidates::default(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
