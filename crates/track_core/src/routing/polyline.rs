//! Encoded polyline decoding (the Google / OpenRouteService format).
//!
//! Each value is a zig-zag encoded, delta-coded integer split into 5-bit
//! chunks offset by 63. Latitude comes before longitude.

use thiserror::Error;

use crate::geo::Coordinate;

/// Precision used by routing APIs unless configured otherwise.
pub const DEFAULT_PRECISION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolylineError {
    #[error("unexpected character {ch:?} at byte {index}")]
    InvalidCharacter { ch: char, index: usize },
    #[error("polyline ended in the middle of a value")]
    Truncated,
    #[error("value overflows at byte {index}")]
    Overflow { index: usize },
    #[error("decoded point ({latitude}, {longitude}) is out of range")]
    OutOfRange { latitude: f64, longitude: f64 },
}

fn next_value(bytes: &[u8], cursor: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0u32;
    loop {
        let index = *cursor;
        let byte = *bytes.get(index).ok_or(PolylineError::Truncated)?;
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                ch: byte as char,
                index,
            });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow { index });
        }
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        *cursor += 1;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Decode an encoded polyline into coordinates.
pub fn decode(encoded: &str, precision: u32) -> Result<Vec<Coordinate>, PolylineError> {
    let factor = 10f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut cursor = 0usize;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while cursor < bytes.len() {
        lat += next_value(bytes, &mut cursor)?;
        lng += next_value(bytes, &mut cursor)?;
        let latitude = lat as f64 / factor;
        let longitude = lng as f64 / factor;
        let point = Coordinate::new(latitude, longitude)
            .map_err(|_| PolylineError::OutOfRange {
                latitude,
                longitude,
            })?;
        points.push(point);
    }

    Ok(points)
}
