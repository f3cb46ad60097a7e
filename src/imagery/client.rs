use crate::models::GeoPoint;
use anyhow::{Context, Result};
use image::DynamicImage;
use std::time::Duration;
use tracing::debug;

/// The street-level imagery provider caps requests at 640x640.
pub const MAX_DIMENSION: u32 = 640;

const STREET_VIEW_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Requested image dimensions, validated against the provider limit.
#[derive(Debug, Clone, Copy)]
pub struct ImageSize {
    width: u32,
    height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("image size must be non-zero, got {}x{}", width, height);
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            anyhow::bail!(
                "the maximum image size is {}x{}, got {}x{}",
                MAX_DIMENSION,
                MAX_DIMENSION,
                width,
                height
            );
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: MAX_DIMENSION,
            height: MAX_DIMENSION,
        }
    }
}

/// A fetched street-level image. The raw response bytes are kept so the
/// survey archive stores exactly what the provider returned.
pub struct FetchedImage {
    pub image: DynamicImage,
    pub bytes: Vec<u8>,
    pub format: &'static str,
}

/// Street View Static API client.
pub struct StreetViewClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl StreetViewClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: STREET_VIEW_URL.to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a street-level image at the given position, oriented along
    /// `heading` (compass degrees) when provided.
    pub async fn fetch(
        &self,
        location: GeoPoint,
        heading: Option<u16>,
        pitch: Option<i32>,
        size: ImageSize,
    ) -> Result<FetchedImage> {
        let mut query: Vec<(&str, String)> = vec![
            ("size", format!("{}x{}", size.width, size.height)),
            ("location", format!("{},{}", location.lat, location.lng)),
            ("source", "outdoor".to_string()),
        ];
        if let Some(h) = heading {
            query.push(("heading", h.to_string()));
        }
        if let Some(p) = pitch {
            query.push(("pitch", p.to_string()));
        }
        query.push(("key", self.api_key.clone()));

        let resp = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .context("street-level imagery request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("imagery request returned {}: {}", status, text);
        }

        let bytes = resp
            .bytes()
            .await
            .context("failed to read imagery response body")?
            .to_vec();
        let image = image::load_from_memory(&bytes)
            .context("failed to decode street-level image")?;

        debug!(
            lat = location.lat,
            lng = location.lng,
            heading,
            bytes = bytes.len(),
            "image fetched"
        );

        Ok(FetchedImage {
            image,
            bytes,
            format: "jpg",
        })
    }
}
