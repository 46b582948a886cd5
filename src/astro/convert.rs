use chrono::{DateTime, Utc};

use super::site::Site;

/// Converts an equatorial position to horizontal coordinates at a site.
pub trait CoordinateConverter: Send + Sync {
    /// Returns `(azimuth, elevation)` in degrees, azimuth measured from
    /// north through east in `[0, 360)`.
    fn convert(&self, ra_deg: f64, dec_deg: f64, site: &Site, time: DateTime<Utc>) -> (f64, f64);
}

/// Low-precision conversion through the local hour angle. Ignores
/// precession, nutation, aberration and refraction (errors of a few
/// arcminutes for current epochs).
#[derive(Debug, Default, Clone, Copy)]
pub struct SiderealConverter;

const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;

fn julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + time.timestamp_subsec_nanos() as f64 * 1e-9;
    UNIX_EPOCH_JD + seconds / 86_400.0
}

/// Greenwich mean sidereal time in degrees (IAU 1982 expression).
pub fn greenwich_sidereal_deg(time: DateTime<Utc>) -> f64 {
    let d = julian_date(time) - J2000_JD;
    let t = d / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    gmst.rem_euclid(360.0)
}

pub fn local_sidereal_deg(site: &Site, time: DateTime<Utc>) -> f64 {
    (greenwich_sidereal_deg(time) + site.longitude_deg).rem_euclid(360.0)
}

impl CoordinateConverter for SiderealConverter {
    fn convert(&self, ra_deg: f64, dec_deg: f64, site: &Site, time: DateTime<Utc>) -> (f64, f64) {
        let ha = (local_sidereal_deg(site, time) - ra_deg).to_radians();
        let dec = dec_deg.to_radians();
        let lat = site.lat_rad();

        let sin_el = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
        let el = sin_el.clamp(-1.0, 1.0).asin();
        let az = (-ha.sin() * dec.cos()).atan2(dec.sin() * lat.cos() - dec.cos() * ha.cos() * lat.sin());

        (az.to_degrees().rem_euclid(360.0), el.to_degrees())
    }
}
