use std::path::Path;

use super::error::AstroError;

/// Mechanical correction added to the ideal azimuth and elevation.
pub trait PointingModel: Send + Sync {
    /// Returns `(delta_az, delta_el)` in degrees.
    fn correct(&self, az: f64, el: f64) -> (f64, f64);

    fn describe(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullPointingModel;

impl PointingModel for NullPointingModel {
    fn correct(&self, _az: f64, _el: f64) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Seven-term altazimuth mount model, coefficients in degrees:
///
/// | # | term |
/// |---|---|
/// | 0 | azimuth encoder offset |
/// | 1 | collimation error (`sec E`) |
/// | 2 | azimuth/elevation non-perpendicularity (`tan E`) |
/// | 3 | azimuth axis tilt towards north |
/// | 4 | azimuth axis tilt towards east |
/// | 5 | elevation encoder offset |
/// | 6 | gravitational sag (`cos E`) |
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricPointingModel {
    params: [f64; Self::TERMS],
}

// Keeps sec/tan finite near the zenith.
const MIN_COS_EL: f64 = 1e-3;

impl ParametricPointingModel {
    pub const TERMS: usize = 7;

    /// Missing trailing coefficients are zero.
    pub fn new(params: &[f64]) -> Result<Self, AstroError> {
        if params.len() > Self::TERMS {
            return Err(AstroError::PointingModel(format!(
                "expected at most {} coefficients, got {}",
                Self::TERMS,
                params.len()
            )));
        }
        let mut all = [0.0; Self::TERMS];
        all[..params.len()].copy_from_slice(params);
        Ok(Self { params: all })
    }

    /// Reads whitespace-separated coefficients; `#` starts a comment.
    pub fn from_file(path: &Path) -> Result<Self, AstroError> {
        let content = std::fs::read_to_string(path)?;
        let params = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default())
            .flat_map(str::split_whitespace)
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    AstroError::PointingModel(format!("bad coefficient '{}'", token))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(&params)
    }
}

impl PointingModel for ParametricPointingModel {
    fn correct(&self, az: f64, el: f64) -> (f64, f64) {
        let p = &self.params;
        let (a, e) = (az.to_radians(), el.to_radians());
        let cos_e = e.cos().max(MIN_COS_EL);
        let tan_e = e.sin() / cos_e;

        let d_az = p[0] + p[1] / cos_e + p[2] * tan_e + (p[3] * a.sin() + p[4] * a.cos()) * tan_e;
        let d_el = p[5] + p[6] * e.cos() + p[3] * a.cos() - p[4] * a.sin();
        (d_az, d_el)
    }

    fn describe(&self) -> String {
        let terms: Vec<String> = self.params.iter().map(|p| format!("{:.6}", p)).collect();
        format!("parametric [{}]", terms.join(", "))
    }
}
