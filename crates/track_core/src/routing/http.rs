use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::geo::Coordinate;

use super::error::EndpointError;
use super::response::{EncodedPolylineRoute, GeoJsonRoute, RouteResponse};
use super::RouteEndpoint;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Geometry encoding an endpoint answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    GeoJson,
    EncodedPolyline,
}

/// Blocking HTTP client for a directions endpoint that accepts
/// `{"coordinates": [[lon, lat], [lon, lat]]}` and a static API key header.
#[derive(Debug, Clone)]
pub struct HttpRouteEndpoint {
    client: Client,
    name: String,
    url: String,
    api_key: String,
    format: ResponseFormat,
}

impl HttpRouteEndpoint {
    pub fn new(
        name: &str,
        url: &str,
        api_key: &str,
        format: ResponseFormat,
    ) -> Result<Self, EndpointError> {
        Self::with_timeout(name, url, api_key, format, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        name: &str,
        url: &str,
        api_key: &str,
        format: ResponseFormat,
        timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            format,
        })
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }
}

pub(super) fn request_body(origin: Coordinate, destination: Coordinate) -> serde_json::Value {
    json!({ "coordinates": [origin.to_lon_lat(), destination.to_lon_lat()] })
}

impl RouteEndpoint for HttpRouteEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn request(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteResponse, EndpointError> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.api_key)
            .header(ACCEPT, "application/json, application/geo+json")
            .json(&request_body(origin, destination))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EndpointError::Status(status.as_u16()));
        }

        let text = response.text()?;
        let parsed = match self.format {
            ResponseFormat::GeoJson => serde_json::from_str::<GeoJsonRoute>(&text)
                .map(RouteResponse::GeoJson),
            ResponseFormat::EncodedPolyline => serde_json::from_str::<EncodedPolylineRoute>(&text)
                .map(RouteResponse::EncodedPolyline),
        };
        parsed.map_err(|err| EndpointError::Malformed(err.to_string()))
    }
}
