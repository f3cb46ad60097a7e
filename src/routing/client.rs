use crate::models::GeoPoint;
use crate::routing::geometry::RoutePath;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_PROFILE: &str = "foot-walking";

const ORS_BASE_URL: &str = "https://api.openrouteservice.org/v2/directions";

/// A walking route resolved by the directions provider.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    /// Ordered (lng, lat) pairs exactly as returned by the provider.
    pub geometry: Vec<(f64, f64)>,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Serialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
    units: &'static str,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: FeatureGeometry,
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Deserialize)]
struct FeatureGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize, Default)]
struct FeatureProperties {
    summary: Option<RouteSummary>,
}

#[derive(Deserialize)]
struct RouteSummary {
    distance: f64,
    duration: f64,
}

/// OpenRouteService directions client.
pub struct OrsClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl OrsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: ORS_BASE_URL.to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    /// Override the provider base URL (self-hosted instances).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve a route between two points for the given routing profile.
    pub async fn directions(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        profile: &str,
    ) -> Result<ResolvedRoute> {
        let url = format!("{}/{}/geojson", self.base_url, profile);
        let body = DirectionsRequest {
            coordinates: [[start.lng, start.lat], [end.lng, end.lat]],
            units: "m",
        };

        let resp = self
            .http
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("directions request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("directions request returned {}: {}", status, text);
        }

        let parsed: DirectionsResponse = resp
            .json()
            .await
            .context("invalid directions response")?;

        let feature = parsed
            .features
            .into_iter()
            .next()
            .context("directions response contains no route")?;

        let geometry: Vec<(f64, f64)> = feature
            .geometry
            .coordinates
            .iter()
            .map(|c| (c[0], c[1]))
            .collect();
        if geometry.len() < 2 {
            anyhow::bail!("route geometry has fewer than 2 coordinates");
        }

        let (distance_m, duration_s) = match feature.properties.summary {
            Some(summary) => (summary.distance, summary.duration),
            None => (RoutePath::from_lnglat(&geometry)?.length_m(), 0.0),
        };

        info!(
            distance_m,
            duration_s,
            coordinates = geometry.len(),
            "route resolved"
        );

        Ok(ResolvedRoute {
            geometry,
            distance_m,
            duration_s,
        })
    }
}
