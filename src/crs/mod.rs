//! Spatial reference handling.
//!
//! Buffer distances are only meaningful in linear units, so footprints that
//! arrive in a geographic (degree-based) system are projected to a single
//! fixed metric system before any geometry arithmetic happens.
//!
//! - `SpatialRef` parses the reference names found in GeoJSON `crs` members
//! - `Reprojector` moves footprints into `WORKING_EPSG`

use geo::{Coord, MapCoords, MultiPolygon};

use crate::error::{AppError, ErrorKind, GeometryError};

pub mod utm;

use utm::UtmZone;

/// Projected system every geographic input is moved into (WGS84 / UTM 32N).
pub const WORKING_ZONE: UtmZone = UtmZone::north(32);
pub const WORKING_EPSG: u32 = 32632;

/// EPSG codes of geographic 2D/3D systems recognised without PROJ.
const GEOGRAPHIC_EPSG: &[u32] = &[4019, 4230, 4258, 4267, 4269, 4283, 4326, 4617, 4674, 4979];

/// Geographic codes that are WGS84 itself (2D and 3D).
const WGS84_EPSG: &[u32] = &[4326, 4979];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRef {
    Epsg(u32),
    /// OGC CRS84: WGS84 with longitude/latitude axis order (GeoJSON default).
    Crs84,
}

impl SpatialRef {
    /// RFC 7946 default when a GeoJSON file carries no `crs` member.
    pub const GEOJSON_DEFAULT: SpatialRef = SpatialRef::Crs84;

    /// Parse names like `EPSG:4326`, `urn:ogc:def:crs:EPSG::32632` or
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let trimmed = name.trim();
        if trimmed.to_ascii_uppercase().ends_with("CRS84") {
            return Ok(SpatialRef::Crs84);
        }
        if trimmed.to_ascii_uppercase().contains("EPSG") {
            let code = trimmed
                .rsplit(':')
                .find(|s| !s.is_empty())
                .and_then(|s| s.parse::<u32>().ok());
            if let Some(code) = code {
                return Ok(SpatialRef::Epsg(code));
            }
        }
        Err(AppError::new(
            ErrorKind::InvalidInput,
            format!("Unrecognised coordinate reference system '{name}'."),
        ))
    }

    pub fn epsg(&self) -> u32 {
        match self {
            SpatialRef::Epsg(code) => *code,
            SpatialRef::Crs84 => 4326,
        }
    }

    pub fn is_geographic(&self) -> bool {
        match self {
            SpatialRef::Crs84 => true,
            SpatialRef::Epsg(code) => GEOGRAPHIC_EPSG.contains(code),
        }
    }

    pub fn is_wgs84(&self) -> bool {
        match self {
            SpatialRef::Crs84 => true,
            SpatialRef::Epsg(code) => WGS84_EPSG.contains(code),
        }
    }

    #[cfg(feature = "proj")]
    fn proj_name(&self) -> String {
        match self {
            SpatialRef::Crs84 => "OGC:CRS84".to_string(),
            SpatialRef::Epsg(code) => format!("EPSG:{code}"),
        }
    }

    /// Name written into exported GeoJSON `crs` members.
    pub fn urn(&self) -> String {
        match self {
            SpatialRef::Crs84 => "urn:ogc:def:crs:OGC:1.3:CRS84".to_string(),
            SpatialRef::Epsg(code) => format!("urn:ogc:def:crs:EPSG::{code}"),
        }
    }
}

/// Moves footprints from a geographic source system into the working system.
///
/// Without the `proj` feature only WGS84 sources are accepted; other
/// geographic datums are refused instead of being treated as WGS84.
pub struct Reprojector {
    source: SpatialRef,
    #[cfg(feature = "proj")]
    transform: proj::Proj,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector").field("source", &self.source).finish()
    }
}

impl Reprojector {
    /// `None` when `source` is already projected and footprints pass through.
    #[cfg(not(feature = "proj"))]
    pub fn for_source(source: SpatialRef) -> Result<Option<Self>, AppError> {
        if !source.is_geographic() {
            return Ok(None);
        }
        if !source.is_wgs84() {
            return Err(AppError::new(
                ErrorKind::InvalidInput,
                format!(
                    "EPSG:{} is a non-WGS84 geographic system; build with the `proj` feature to reproject it.",
                    source.epsg()
                ),
            ));
        }
        Ok(Some(Self { source }))
    }

    /// `None` when PROJ reports `source` as anything but a geographic CRS.
    #[cfg(feature = "proj")]
    pub fn for_source(source: SpatialRef) -> Result<Option<Self>, AppError> {
        if !proj_is_geographic(source)? {
            return Ok(None);
        }
        let from = source.proj_name();
        let to = format!("EPSG:{WORKING_EPSG}");
        let transform = proj::Proj::new_known_crs(&from, &to, None).map_err(|e| {
            AppError::new(
                ErrorKind::InvalidInput,
                format!("Failed to create transform {from} -> {to}: {e}"),
            )
        })?;
        Ok(Some(Self { source, transform }))
    }

    pub fn target(&self) -> SpatialRef {
        SpatialRef::Epsg(WORKING_EPSG)
    }

    /// Project one footprint. Geographic coordinates are `(lon, lat)`.
    pub fn project(&self, footprint: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
        footprint.try_map_coords(|c| {
            check_lon_lat(c)?;
            self.forward(c)
        })
    }

    #[cfg(not(feature = "proj"))]
    fn forward(&self, c: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        let (x, y) = WORKING_ZONE.forward(c.x, c.y);
        Ok(Coord { x, y })
    }

    #[cfg(feature = "proj")]
    fn forward(&self, c: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        let (x, y) = self
            .transform
            .convert((c.x, c.y))
            .map_err(|e| GeometryError::Reprojection(format!("({}, {}): {e}", c.x, c.y)))?;
        if !(x.is_finite() && y.is_finite()) {
            return Err(GeometryError::Reprojection(format!("({}, {}) has no finite image", c.x, c.y)));
        }
        Ok(Coord { x, y })
    }
}

fn check_lon_lat(c: Coord<f64>) -> Result<(), GeometryError> {
    let in_range = c.x.is_finite() && c.y.is_finite() && c.x.abs() <= 180.0 && c.y.abs() <= 90.0;
    if in_range {
        Ok(())
    } else {
        Err(GeometryError::Reprojection(format!(
            "({}, {}) is outside longitude/latitude range",
            c.x, c.y
        )))
    }
}

/// Ask PROJ for the kind of `source` instead of trusting `GEOGRAPHIC_EPSG`.
#[cfg(feature = "proj")]
fn proj_is_geographic(source: SpatialRef) -> Result<bool, AppError> {
    let name = source.proj_name();
    let crs = proj::Proj::new(&name).map_err(|e| {
        AppError::new(ErrorKind::InvalidInput, format!("Unknown coordinate reference system {name}: {e}"))
    })?;
    let json = crs.to_projjson(None, None, None).map_err(|e| {
        AppError::new(ErrorKind::InvalidInput, format!("Failed to describe {name}: {e}"))
    })?;
    let description: serde_json::Value = serde_json::from_str(&json).map_err(|e| {
        AppError::new(ErrorKind::InvalidInput, format!("Unreadable PROJJSON for {name}: {e}"))
    })?;
    Ok(description.get("type").and_then(|t| t.as_str()) == Some("GeographicCRS"))
}
