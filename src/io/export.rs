//! Export buffer rings grouped by offset distance.
//!
//! Every distinct distance becomes one GeoJSON file under
//! `<root>/<user>/<location>/<mapset>/buffer/buffer_<d>.geojson`, ready to be
//! rasterized on its own. Path building is pure; only `export_distance_groups`
//! touches the filesystem.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use rayon::prelude::*;
use serde::Serialize;

use crate::crs::SpatialRef;
use crate::domain::{BufferRecordSet, BufferRing, OutputContext, distance_key};
use crate::error::{AppError, ErrorKind};

/// Rings sharing one (rounded) offset distance.
#[derive(Debug, Clone)]
pub struct DistanceGroup<'a> {
    pub distance: f64,
    pub rings: Vec<&'a BufferRing>,
}

/// One written artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedGroup {
    pub distance: f64,
    pub path: PathBuf,
    pub features: usize,
}

/// Partition rings by distance, ordered by increasing distance.
pub fn group_by_distance(records: &BufferRecordSet) -> Vec<DistanceGroup<'_>> {
    let mut groups: BTreeMap<i64, Vec<&BufferRing>> = BTreeMap::new();
    for ring in &records.rings {
        groups.entry(ring.distance_key()).or_default().push(ring);
    }
    groups
        .into_iter()
        .map(|(key, rings)| DistanceGroup {
            distance: key as f64 / 100.0,
            rings,
        })
        .collect()
}

/// Distance as written in file names: `0.5` -> `0_5`, `1.0` -> `1_0`, `1.25` -> `1_25`.
pub fn distance_label(distance: f64) -> String {
    let rounded = distance_key(distance) as f64 / 100.0;
    let text = if rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    };
    text.replace('.', "_")
}

pub fn buffer_file_name(distance: f64) -> String {
    format!("buffer_{}.geojson", distance_label(distance))
}

pub fn buffer_file_path(ctx: &OutputContext, distance: f64) -> PathBuf {
    ctx.buffer_dir().join(buffer_file_name(distance))
}

/// Build the feature collection for one group.
pub fn group_to_feature_collection(group: &DistanceGroup<'_>, epsg: Option<u32>) -> FeatureCollection {
    let features = group
        .rings
        .iter()
        .map(|ring| {
            let mut properties = JsonObject::new();
            properties.insert("building_id".to_string(), JsonValue::from(ring.building_id));
            properties.insert("height".to_string(), JsonValue::from(ring.height));
            properties.insert("distance".to_string(), JsonValue::from(ring.distance));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&ring.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = epsg.map(|code| {
        let mut crs = JsonObject::new();
        crs.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": SpatialRef::Epsg(code).urn() }
            }),
        );
        crs
    });

    FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Write one GeoJSON file per distance group, overwriting existing files.
pub fn export_distance_groups(records: &BufferRecordSet, ctx: &OutputContext) -> Result<Vec<ExportedGroup>, AppError> {
    let dir = ctx.buffer_dir();
    fs::create_dir_all(&dir)
        .map_err(|e| AppError::io(format!("Failed to create output dir '{}': {e}", dir.display())))?;

    let groups = group_by_distance(records);
    tracing::info!(groups = groups.len(), dir = %dir.display(), "Exporting distance groups");

    // Distinct distances map to distinct paths, so writes never collide.
    groups
        .par_iter()
        .map(|group| -> Result<ExportedGroup, AppError> {
            let path = buffer_file_path(ctx, group.distance);
            let collection = group_to_feature_collection(group, records.epsg);
            write_feature_collection(&path, &collection)?;
            tracing::info!(path = %path.display(), features = group.rings.len(), "Saved distance group");
            Ok(ExportedGroup {
                distance: group.distance,
                path,
                features: group.rings.len(),
            })
        })
        .collect()
}

fn write_feature_collection(path: &Path, collection: &FeatureCollection) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, collection)
        .map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))?;
    Ok(())
}

/// Read an exported group back into rings.
pub fn read_distance_group(path: &Path) -> Result<Vec<BufferRing>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::not_found(format!("Failed to open '{}': {e}", path.display())))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| AppError::new(ErrorKind::InvalidInput, format!("Invalid GeoJSON '{}': {e}", path.display())))?;
    let GeoJson::FeatureCollection(fc) = geojson else {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            format!("'{}' is not a FeatureCollection.", path.display()),
        ));
    };

    fc.features.iter().map(ring_from_feature).collect()
}

fn ring_from_feature(feature: &Feature) -> Result<BufferRing, AppError> {
    let invalid = |what: &str| AppError::new(ErrorKind::InvalidInput, format!("Buffer feature has no valid {what}."));

    let geometry = feature.geometry.clone().ok_or_else(|| invalid("geometry"))?;
    let geometry = geo::Polygon::<f64>::try_from(geometry.value).map_err(|_| invalid("polygon"))?;
    let building_id = feature
        .property("building_id")
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| invalid("building_id"))?;
    let height = feature
        .property("height")
        .and_then(JsonValue::as_f64)
        .ok_or_else(|| invalid("height"))?;
    let distance = feature
        .property("distance")
        .and_then(JsonValue::as_f64)
        .ok_or_else(|| invalid("distance"))?;

    Ok(BufferRing {
        building_id: building_id as usize,
        geometry,
        distance,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use tempfile::TempDir;

    fn ring(building_id: usize, distance: f64, height: f64) -> BufferRing {
        BufferRing {
            building_id,
            geometry: polygon![
                (x: distance, y: distance),
                (x: 10.0 - distance, y: distance),
                (x: 10.0 - distance, y: 10.0 - distance),
                (x: distance, y: 10.0 - distance),
                (x: distance, y: distance),
            ],
            distance,
            height,
        }
    }

    fn records() -> BufferRecordSet {
        BufferRecordSet {
            rings: vec![
                ring(0, 0.5, 8.5),
                ring(0, 1.0, 8.0),
                ring(3, 0.5, 4.712_345_678_9),
                ring(0, 1.5, 7.5),
            ],
            failures: Vec::new(),
            epsg: Some(32632),
        }
    }

    fn context(root: &Path) -> OutputContext {
        OutputContext {
            root: root.to_path_buf(),
            user: "alice".to_string(),
            location: "location_epsg_32632".to_string(),
            mapset: "mapset_alice_1".to_string(),
        }
    }

    #[test]
    fn labels_match_python_float_text() {
        assert_eq!(distance_label(0.5), "0_5");
        assert_eq!(distance_label(1.0), "1_0");
        assert_eq!(distance_label(1.25), "1_25");
        assert_eq!(distance_label(0.1 + 0.2), "0_3");
        assert_eq!(distance_label(12.0), "12_0");
        assert_eq!(buffer_file_name(4.5), "buffer_4_5.geojson");
    }

    #[test]
    fn tie_distances_label_like_python_round() {
        assert_eq!(buffer_file_name(0.125), "buffer_0_12.geojson");
        assert_eq!(distance_label(0.625), "0_62");
        assert_eq!(distance_label(0.375), "0_38");
    }

    #[test]
    fn path_follows_user_location_mapset_layout() {
        let ctx = context(Path::new("/srv/userdata"));
        assert_eq!(
            buffer_file_path(&ctx, 0.5),
            PathBuf::from("/srv/userdata/alice/location_epsg_32632/mapset_alice_1/buffer/buffer_0_5.geojson")
        );
    }

    #[test]
    fn groups_are_partitioned_by_distance() {
        let records = records();
        let groups = group_by_distance(&records);
        let summary: Vec<(f64, usize)> = groups.iter().map(|g| (g.distance, g.rings.len())).collect();
        assert_eq!(summary, vec![(0.5, 2), (1.0, 1), (1.5, 1)]);
        let ids: Vec<usize> = groups[0].rings.iter().map(|r| r.building_id).collect();
        assert_eq!(ids, vec![0, 3]);
    }

    #[test]
    fn export_writes_one_file_per_distance_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let records = records();

        let exported = export_distance_groups(&records, &ctx).unwrap();
        assert_eq!(exported.len(), 3);
        for e in &exported {
            assert!(e.path.exists(), "{} missing", e.path.display());
        }

        let reloaded = read_distance_group(&buffer_file_path(&ctx, 0.5)).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded[0].building_id, 0);
        assert_eq!(reloaded[0].height, 8.5);
        assert_eq!(reloaded[0].distance, 0.5);
        assert_eq!(reloaded[1].building_id, 3);
        assert_eq!(reloaded[1].height, 4.712_345_678_9);
        assert_eq!(reloaded[1].geometry, records.rings[2].geometry);
    }

    #[test]
    fn exported_files_carry_the_working_crs() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        export_distance_groups(&records(), &ctx).unwrap();

        let text = fs::read_to_string(buffer_file_path(&ctx, 1.0)).unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32632");
    }

    #[test]
    fn re_export_overwrites_in_place() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        export_distance_groups(&records(), &ctx).unwrap();
        let first = fs::read_to_string(buffer_file_path(&ctx, 0.5)).unwrap();
        export_distance_groups(&records(), &ctx).unwrap();
        let second = fs::read_to_string(buffer_file_path(&ctx, 0.5)).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(ctx.buffer_dir()).unwrap().count(), 3);
    }

    #[test]
    fn empty_record_set_creates_directory_only() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let exported = export_distance_groups(&BufferRecordSet::default(), &ctx).unwrap();
        assert!(exported.is_empty());
        assert!(ctx.buffer_dir().is_dir());
    }
}
