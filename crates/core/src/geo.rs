//! Delivery-zone geometry.
//!
//! Points are `[longitude, latitude]` everywhere inside this crate. The only
//! place latitude-first data is accepted is [`DeliveryZone::from_lat_lon_json`],
//! which transposes and validates the ring once at configuration-load time.

use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Ray-casting point-in-polygon test against a single exterior ring.
///
/// Casts a horizontal ray from `point` and counts how many ring edges it
/// crosses; an odd count means the point is inside. Holes are not supported.
/// The ring may be closed (first vertex repeated last) or open.
#[must_use]
pub fn point_in_polygon(point: LonLat, ring: &[LonLat]) -> bool {
    let (x, y) = (point.lon, point.lat);
    let mut inside = false;

    let mut previous = match ring.last() {
        Some(vertex) => *vertex,
        None => return false,
    };

    for current in ring {
        let (xi, yi) = (current.lon, current.lat);
        let (xj, yj) = (previous.lon, previous.lat);

        let straddles = (yi > y) != (yj > y);
        if straddles && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }

        previous = *current;
    }

    inside
}

/// Smallest accepted doubled ring area in square degrees, well under a city block.
const MIN_RING_AREA: f64 = 1e-10;

/// Twice the signed area of a closed ring (shoelace formula).
fn ring_area(ring: &[LonLat]) -> f64 {
    ring.windows(2)
        .map(|edge| edge[0].lon * edge[1].lat - edge[1].lon * edge[0].lat)
        .sum()
}

fn distinct_vertices(ring: &[LonLat]) -> usize {
    let mut seen: Vec<LonLat> = Vec::with_capacity(ring.len());
    for point in ring {
        if !seen.contains(point) {
            seen.push(*point);
        }
    }
    seen.len()
}

/// Reasons a configured polygon is rejected at load time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZoneError {
    /// The configuration is not a JSON array of coordinate pairs.
    #[error("delivery zone is not a list of [lat, lon] pairs: {0}")]
    Format(String),
    /// A closed ring needs at least three distinct vertices plus the closing one.
    #[error("delivery zone needs at least 4 points (closed ring), got {0}")]
    TooFewPoints(usize),
    /// First and last vertex differ.
    #[error("delivery zone ring is not closed (first point must equal last point)")]
    NotClosed,
    /// A latitude outside [-90, 90] or a longitude outside [-180, 180].
    ///
    /// This is usually the symptom of longitude-first data fed to the
    /// latitude-first loader.
    #[error("coordinate {index} is out of range: lat {lat}, lon {lon}")]
    OutOfRange { index: usize, lat: f64, lon: f64 },
    /// Fewer than three distinct vertices, or all vertices on one line.
    #[error("delivery zone ring encloses no area")]
    Degenerate,
}

/// The polygon inside which home delivery is offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryZone {
    ring: Vec<LonLat>,
}

impl DeliveryZone {
    /// Build a zone from a longitude-first closed ring.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError` if the ring is too short, has coordinates outside
    /// the valid ranges, is not closed, or encloses no area.
    pub fn from_ring(ring: Vec<LonLat>) -> Result<Self, ZoneError> {
        if ring.len() < 4 {
            return Err(ZoneError::TooFewPoints(ring.len()));
        }

        for (index, point) in ring.iter().enumerate() {
            let valid = point.lat.is_finite()
                && point.lon.is_finite()
                && (-90.0..=90.0).contains(&point.lat)
                && (-180.0..=180.0).contains(&point.lon);
            if !valid {
                return Err(ZoneError::OutOfRange {
                    index,
                    lat: point.lat,
                    lon: point.lon,
                });
            }
        }

        if ring.first() != ring.last() {
            return Err(ZoneError::NotClosed);
        }

        if distinct_vertices(&ring) < 3 || ring_area(&ring).abs() < MIN_RING_AREA {
            return Err(ZoneError::Degenerate);
        }

        Ok(Self { ring })
    }

    /// Load a zone from latitude-first JSON (`[[lat, lon], ...]`), the format
    /// the delivery-zone configuration is written in.
    ///
    /// # Errors
    ///
    /// Returns `ZoneError::Format` for anything that is not a list of numeric
    /// pairs, and the `from_ring` errors for invalid geometry.
    pub fn from_lat_lon_json(raw: &str) -> Result<Self, ZoneError> {
        let pairs: Vec<[f64; 2]> =
            serde_json::from_str(raw).map_err(|e| ZoneError::Format(e.to_string()))?;

        let ring = pairs
            .into_iter()
            .map(|[lat, lon]| LonLat::new(lon, lat))
            .collect();

        Self::from_ring(ring)
    }

    /// The longitude-first ring.
    #[must_use]
    pub fn ring(&self) -> &[LonLat] {
        &self.ring
    }

    /// Whether the point lies inside the zone.
    #[must_use]
    pub fn contains(&self, point: LonLat) -> bool {
        point_in_polygon(point, &self.ring)
    }
}
