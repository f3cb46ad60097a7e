use crate::models::{GeoPoint, LampDetection};
use anyhow::{Context, Result};
use base64::Engine;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Request sent to the confirmation endpoint. Each entry carries the
/// detection geometry plus a JPEG crop of the candidate region so the
/// vision-language model sees what the detector saw.
#[derive(Debug, Serialize)]
struct ConfirmRequest {
    event_id: String,
    lat: f64,
    lng: f64,
    detections: Vec<DetectionPayload>,
}

#[derive(Debug, Serialize)]
struct DetectionPayload {
    index: usize,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    brightness: f32,
    confidence: f32,
    base64_image: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    #[allow(dead_code)]
    event_id: String,
    verdicts: Vec<Verdict>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    index: usize,
    confirmed: bool,
    #[serde(default)]
    adjusted_confidence: Option<f32>,
}

/// Client for a remote vision-language endpoint that double-checks
/// low-confidence luminaire detections.
pub struct ConfirmClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ConfirmClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    /// Submit detections below `confirm_below` for remote confirmation.
    ///
    /// Returns `(detection, verified)` pairs: rejected detections are
    /// removed, confirmed ones are marked verified and may carry an
    /// adjusted confidence. Detections at or above the threshold pass
    /// through untouched.
    pub async fn confirm(
        &self,
        location: GeoPoint,
        frame: &DynamicImage,
        detections: Vec<LampDetection>,
        confirm_below: f32,
    ) -> Result<Vec<(LampDetection, bool)>> {
        let doubtful: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.confidence < confirm_below)
            .map(|(i, _)| i)
            .collect();

        if doubtful.is_empty() {
            return Ok(detections.into_iter().map(|d| (d, false)).collect());
        }

        let mut payloads = Vec::with_capacity(doubtful.len());
        for &i in &doubtful {
            let d = &detections[i];
            let crop = crop_detection(frame, d);
            let jpeg = encode_jpeg(&crop, 85)?;
            payloads.push(DetectionPayload {
                index: i,
                x: d.x,
                y: d.y,
                width: d.width,
                height: d.height,
                brightness: d.brightness,
                confidence: d.confidence,
                base64_image: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            });
        }

        let request = ConfirmRequest {
            event_id: Uuid::new_v4().to_string(),
            lat: location.lat,
            lng: location.lng,
            detections: payloads,
        };

        info!(
            event_id = %request.event_id,
            submitted = request.detections.len(),
            total = detections.len(),
            "submitting detections for confirmation"
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("confirmation request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("confirmation endpoint returned {}: {}", status, text);
        }

        let parsed: ConfirmResponse = resp
            .json()
            .await
            .context("invalid confirmation response")?;

        let mut result = Vec::with_capacity(detections.len());
        for (i, mut d) in detections.into_iter().enumerate() {
            if !doubtful.contains(&i) {
                result.push((d, false));
                continue;
            }
            match parsed.verdicts.iter().find(|v| v.index == i) {
                Some(v) if v.confirmed => {
                    if let Some(adjusted) = v.adjusted_confidence {
                        d.confidence = adjusted.clamp(0.0, 1.0);
                    }
                    result.push((d, true));
                }
                Some(_) => {
                    debug!(index = i, "detection rejected by confirmation endpoint");
                }
                // No verdict for this index: keep it unconfirmed
                None => result.push((d, false)),
            }
        }

        Ok(result)
    }
}

/// Extract the detection region with context padding, clamped to the frame.
fn crop_detection(frame: &DynamicImage, d: &LampDetection) -> DynamicImage {
    let padding = 8u32;
    let x = d.x.saturating_sub(padding);
    let y = d.y.saturating_sub(padding);
    let width = (d.width + 2 * padding).min(frame.width() - x);
    let height = (d.height + 2 * padding).min(frame.height() - y);
    frame.crop_imm(x, y, width.max(1), height.max(1))
}

/// Encode an image to JPEG bytes using the `image` crate.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    use std::io::Cursor;

    let rgb = img.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| anyhow::anyhow!("Failed to encode detection crop: {}", e))?;
    Ok(buf.into_inner())
}
