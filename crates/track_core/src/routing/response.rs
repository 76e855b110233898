//! Routing API response shapes and their adapters into [`RoutePath`].
//!
//! The two endpoint variants return different geometry encodings. Both are
//! captured in [`RouteResponse`] and decoded into the common [`DecodedRoute`]
//! so the provider never branches on field presence.

use serde::Deserialize;

use crate::geo::Coordinate;

use super::error::EndpointError;
use super::polyline;
use super::RoutePath;

/// Geometry + summary as returned by one endpoint variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResponse {
    GeoJson(GeoJsonRoute),
    EncodedPolyline(EncodedPolylineRoute),
}

/// Summary block shared by both formats (metres / seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RouteSummary {
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// GeoJSON `FeatureCollection` route (`[lon, lat]` coordinate list).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoJsonRoute {
    pub features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoJsonFeature {
    pub geometry: GeoJsonGeometry,
    #[serde(default)]
    pub properties: GeoJsonProperties,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoJsonGeometry {
    pub coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeoJsonProperties {
    #[serde(default)]
    pub summary: RouteSummary,
}

/// JSON route list with an encoded polyline geometry per route.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncodedPolylineRoute {
    pub routes: Vec<EncodedRoute>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncodedRoute {
    pub geometry: String,
    #[serde(default)]
    pub summary: RouteSummary,
}

/// Endpoint-agnostic result of decoding a [`RouteResponse`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRoute {
    pub path: RoutePath,
    /// Road-network distance reported by the endpoint, if any.
    pub distance_km: Option<f64>,
}

impl RouteResponse {
    pub fn decode(self) -> Result<DecodedRoute, EndpointError> {
        match self {
            RouteResponse::GeoJson(route) => decode_geojson(route),
            RouteResponse::EncodedPolyline(route) => decode_polyline(route),
        }
    }
}

fn summary_distance_km(summary: RouteSummary) -> Option<f64> {
    summary
        .distance
        .filter(|metres| metres.is_finite() && *metres > 0.0)
        .map(|metres| metres / 1000.0)
}

fn decode_geojson(route: GeoJsonRoute) -> Result<DecodedRoute, EndpointError> {
    let feature = route.features.into_iter().next().ok_or(EndpointError::NoRoute)?;
    let points = feature
        .geometry
        .coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            // Elevation, when present, is the third element and ignored.
            [lon, lat, ..] => Ok(Coordinate::new(*lat, *lon)?),
            _ => Err(EndpointError::Malformed(format!(
                "coordinate with {} components",
                pair.len()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let path = RoutePath::new(points)
        .map_err(|err| EndpointError::Malformed(err.to_string()))?;
    Ok(DecodedRoute {
        path,
        distance_km: summary_distance_km(feature.properties.summary),
    })
}

fn decode_polyline(route: EncodedPolylineRoute) -> Result<DecodedRoute, EndpointError> {
    let route = route.routes.into_iter().next().ok_or(EndpointError::NoRoute)?;
    let points = polyline::decode(&route.geometry, polyline::DEFAULT_PRECISION)?;
    let path = RoutePath::new(points)
        .map_err(|err| EndpointError::Malformed(err.to_string()))?;
    Ok(DecodedRoute {
        path,
        distance_km: summary_distance_km(route.summary),
    })
}
