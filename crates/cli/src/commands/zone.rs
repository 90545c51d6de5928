//! Delivery zone checks.
//!
//! Loads the zone through the same `[lat, lon]` transposition and ring
//! validation the server applies at start-up, so a zone that passes here
//! is the zone the server will enforce.

use std::path::Path;

use greenbasket_core::geo::{DeliveryZone, LonLat, ZoneError};
use thiserror::Error;

/// Environment variable the server reads the zone from.
pub const ZONE_ENV_VAR: &str = "DELIVERY_ZONE_POLYGON";

#[derive(Debug, Error)]
pub enum ZoneCheckError {
    #[error("{ZONE_ENV_VAR} is not set and no --file was given")]
    NotConfigured,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid delivery zone: {0}")]
    Invalid(#[from] ZoneError),
}

/// Read the raw zone JSON from `file`, or from the environment.
fn load_raw(file: Option<&Path>) -> Result<String, ZoneCheckError> {
    if let Some(path) = file {
        return std::fs::read_to_string(path).map_err(|source| ZoneCheckError::Read {
            path: path.display().to_string(),
            source,
        });
    }

    let _ = dotenvy::dotenv();
    std::env::var(ZONE_ENV_VAR).map_err(|_| ZoneCheckError::NotConfigured)
}

/// Parse the zone and, if given, test a `(lat, lon)` point against it.
///
/// Returns the zone and whether the point is inside.
///
/// # Errors
///
/// Returns an error if the zone cannot be read or is malformed.
pub fn evaluate(raw: &str, point: Option<(f64, f64)>) -> Result<(DeliveryZone, Option<bool>), ZoneCheckError> {
    let zone = DeliveryZone::from_lat_lon_json(raw)?;
    let inside = point.map(|(lat, lon)| zone.contains(LonLat::new(lon, lat)));
    Ok((zone, inside))
}

/// Validate the configured zone and report the result.
///
/// # Errors
///
/// Returns an error if the zone cannot be read or is malformed.
pub fn check(file: Option<&Path>, point: Option<(f64, f64)>) -> Result<(), ZoneCheckError> {
    let raw = load_raw(file)?;
    let (zone, inside) = evaluate(&raw, point)?;

    #[allow(clippy::print_stdout)]
    {
        println!("Delivery zone OK: {} points (closed ring)", zone.ring().len());
        if let (Some((lat, lon)), Some(inside)) = (point, inside) {
            let verdict = if inside { "inside" } else { "outside" };
            println!("Point lat {lat}, lon {lon} is {verdict} the zone");
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SQUARE: &str = "[[18.50, 73.80], [18.50, 73.90], [18.60, 73.90], [18.60, 73.80], [18.50, 73.80]]";

    #[test]
    fn test_evaluate_point_inside_and_outside() {
        let (zone, inside) = evaluate(SQUARE, Some((18.55, 73.85))).unwrap();
        assert_eq!(zone.ring().len(), 5);
        assert_eq!(inside, Some(true));

        let (_, inside) = evaluate(SQUARE, Some((19.10, 72.90))).unwrap();
        assert_eq!(inside, Some(false));
    }

    #[test]
    fn test_evaluate_rejects_open_ring() {
        let open = "[[18.50, 73.80], [18.50, 73.90], [18.60, 73.90], [18.60, 73.80]]";
        assert!(matches!(
            evaluate(open, None),
            Err(ZoneCheckError::Invalid(_))
        ));
    }

    #[test]
    fn test_check_reads_zone_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone.json");
        std::fs::write(&path, SQUARE).unwrap();

        check(Some(&path), Some((18.55, 73.85))).unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            check(Some(&missing), None),
            Err(ZoneCheckError::Read { .. })
        ));
    }
}
