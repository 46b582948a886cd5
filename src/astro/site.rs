use super::error::AstroError;

/// Geodetic position of the antenna.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub longitude_deg: f64,
    pub latitude_deg: f64,
    pub height_m: f64,
}

impl Site {
    pub fn from_strings(longitude: &str, latitude: &str, height_m: f64) -> Result<Self, AstroError> {
        let longitude_deg = parse_degrees(longitude)?;
        let latitude_deg = parse_degrees(latitude)?;
        if !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(AstroError::OutOfRange(format!("latitude {}", latitude)));
        }
        Ok(Self {
            longitude_deg,
            latitude_deg,
            height_m,
        })
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }
}

/// Parses `[+-]d:m:s` or a decimal value into a signed number of units.
fn parse_sexagesimal(s: &str) -> Result<f64, AstroError> {
    let t = s.trim();
    let invalid = || AstroError::InvalidAngle(s.to_string());
    if t.is_empty() {
        return Err(invalid());
    }
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };

    let mut parts = body.split(':');
    let whole: f64 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;
    let mut value = whole;
    let mut scale = 1.0;
    for part in parts {
        scale /= 60.0;
        let v: f64 = part.parse().map_err(|_| invalid())?;
        if !(0.0..60.0).contains(&v) {
            return Err(invalid());
        }
        value += v * scale;
    }
    if scale < 1.0 / 3600.0 || !value.is_finite() {
        return Err(invalid());
    }
    Ok(if negative { -value } else { value })
}

pub fn parse_degrees(s: &str) -> Result<f64, AstroError> {
    parse_sexagesimal(s)
}

/// Right ascension in degrees. `h:m:s` is read as hours, a plain number
/// as degrees.
pub fn parse_ra(s: &str) -> Result<f64, AstroError> {
    let value = parse_sexagesimal(s)?;
    let deg = if s.contains(':') { value * 15.0 } else { value };
    if !(0.0..360.0).contains(&deg) {
        return Err(AstroError::OutOfRange(format!("right ascension {}", s)));
    }
    Ok(deg)
}

pub fn parse_dec(s: &str) -> Result<f64, AstroError> {
    let deg = parse_sexagesimal(s)?;
    if !(-90.0..=90.0).contains(&deg) {
        return Err(AstroError::OutOfRange(format!("declination {}", s)));
    }
    Ok(deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sexagesimal_and_decimal() {
        assert!((parse_degrees("102:47:45.6").unwrap() - 102.796).abs() < 1e-9);
        assert!((parse_degrees("25:01:40.8").unwrap() - 25.028).abs() < 1e-9);
        assert_eq!(parse_degrees("12.5").unwrap(), 12.5);
        assert!((parse_dec("-00:30:00").unwrap() + 0.5).abs() < 1e-12);
        assert!((parse_ra("05:34:31.94").unwrap() - 83.633083).abs() < 1e-5);
        assert_eq!(parse_ra("83.5").unwrap(), 83.5);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_degrees("").is_err());
        assert!(parse_degrees("12:75:00").is_err());
        assert!(parse_degrees("1:2:3:4").is_err());
        assert!(parse_degrees("abc").is_err());
        assert!(parse_ra("24:00:00").is_err());
        assert!(parse_dec("+91").is_err());
    }

    #[test]
    fn site_from_strings() {
        let site = Site::from_strings("102:47:45.6", "25:01:40.8", 1974.0).unwrap();
        assert!((site.latitude_deg - 25.028).abs() < 1e-9);
        assert!(Site::from_strings("0", "95", 0.0).is_err());
    }
}
