//! Forward transverse Mercator on the WGS84 ellipsoid (Krüger series).
//!
//! Accurate to well below a millimetre within a UTM zone, which is far more
//! than the buffering steps need.

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// A north-hemisphere UTM zone (northing origin at the equator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmZone {
    pub number: u8,
}

impl UtmZone {
    pub const fn north(number: u8) -> Self {
        Self { number }
    }

    pub fn central_meridian_deg(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    /// EPSG code of the WGS84 / UTM north zone.
    pub fn epsg(&self) -> u32 {
        32600 + u32::from(self.number)
    }

    /// Project geographic `(lon, lat)` in degrees to `(easting, northing)` in metres.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;
        let rect_a = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];

        let phi = lat_deg.to_radians();
        let dlam = (lon_deg - self.central_meridian_deg()).to_radians();

        let e2n = 2.0 * n.sqrt() / (1.0 + n);
        let t = (phi.sin().atanh() - e2n * (e2n * phi.sin()).atanh()).sinh();
        let xi = (t / dlam.cos()).atan();
        let eta = (dlam.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut x = eta;
        let mut y = xi;
        for (j, a) in alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            x += a * (k * xi).cos() * (k * eta).sinh();
            y += a * (k * xi).sin() * (k * eta).cosh();
        }

        (UTM_FALSE_EASTING + UTM_K0 * rect_a * x, UTM_K0 * rect_a * y)
    }
}
