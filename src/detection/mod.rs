pub mod blobs;
pub mod confirm;
pub mod luminaire;
pub mod preprocessing;
pub mod stages;

use crate::models::{LampDetection, LuminaireBlob};
use crate::pipeline::{Pipeline, StageData};
use anyhow::Result;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Bright-blob street luminaire detector.
///
/// Defaults are tuned for 640x640 night-time street-level frames.
#[derive(Debug, Clone)]
pub struct LuminaireDetector {
    pub blur_sigma: f32,
    /// Mask threshold: pixels at or above this luminance are lamp candidates.
    pub bright_threshold: u8,
    /// Minimum mask pixels per blob.
    pub min_area: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_compactness: f32,
    /// Minimum mean luminance of the blob region in the source frame.
    pub brightness_threshold: f32,
    /// Fraction of the frame height below which bright blobs are rejected
    /// as reflections rather than lamp heads.
    pub elevation_cutoff: f32,
}

impl LuminaireDetector {
    pub fn new() -> Self {
        Self {
            blur_sigma: 1.2,
            bright_threshold: 225,
            min_area: 12,
            min_radius: 2.0,
            max_radius: 60.0,
            min_compactness: 0.35,
            brightness_threshold: 200.0,
            elevation_cutoff: 0.65,
        }
    }

    /// Build the staged analysis pipeline for these thresholds.
    pub fn build_pipeline(&self) -> Pipeline {
        Pipeline::new()
            .add_stage(Arc::new(stages::GrayscaleStage))
            .add_stage(Arc::new(stages::BlurStage {
                sigma: self.blur_sigma,
            }))
            .add_stage(Arc::new(stages::BrightMaskStage {
                threshold: self.bright_threshold,
            }))
            .add_stage(Arc::new(stages::BlobSplitStage {
                min_area: self.min_area,
                padding: 8,
            }))
            .add_stage(Arc::new(stages::LuminaireFilterStage {
                min_radius: self.min_radius,
                max_radius: self.max_radius,
                min_compactness: self.min_compactness,
                brightness_threshold: self.brightness_threshold,
                elevation_cutoff: self.elevation_cutoff,
            }))
    }

    /// Run detection on a single frame.
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<LampDetection>> {
        let gray = preprocessing::to_grayscale(img);
        let blurred = preprocessing::apply_blur(&gray, self.blur_sigma);
        let mask = preprocessing::bright_mask(&blurred, self.bright_threshold);

        let all_blobs = blobs::find_blobs(&mask, self.min_area);
        debug!(candidates = all_blobs.len(), "bright blobs found");

        let shaped = luminaire::filter_candidates(
            &all_blobs,
            self.min_radius,
            self.max_radius,
            self.min_compactness,
        );
        let elevated = luminaire::filter_elevated(&shaped, img.height(), self.elevation_cutoff);
        let lamps = luminaire::filter_bright(&elevated, img, self.brightness_threshold);

        let mut detections: Vec<LampDetection> = lamps
            .iter()
            .map(|blob| {
                let brightness = blob.mean_brightness(img);
                LampDetection {
                    x: blob.min_x,
                    y: blob.min_y,
                    width: blob.width(),
                    height: blob.height(),
                    brightness,
                    confidence: blob.confidence(brightness),
                }
            })
            .collect();
        // Blob labeling order is arbitrary, keep output stable
        detections.sort_by_key(|d| (d.x, d.y));

        debug!(
            candidates = all_blobs.len(),
            kept = detections.len(),
            "luminaire detection complete"
        );
        Ok(detections)
    }

    /// Bright blobs passing the geometric screen (tuning helper).
    pub fn find_candidates(&self, img: &DynamicImage) -> Result<Vec<LuminaireBlob>> {
        let gray = preprocessing::to_grayscale(img);
        let blurred = preprocessing::apply_blur(&gray, self.blur_sigma);
        let mask = preprocessing::bright_mask(&blurred, self.bright_threshold);
        let all_blobs = blobs::find_blobs(&mask, self.min_area);
        Ok(luminaire::filter_candidates(
            &all_blobs,
            self.min_radius,
            self.max_radius,
            self.min_compactness,
        ))
    }

    /// Run detection, dumping every intermediate stage image into `debug_dir`.
    pub fn detect_with_debug(
        &self,
        img: &DynamicImage,
        debug_dir: PathBuf,
    ) -> Result<Vec<LampDetection>> {
        let items = self.build_pipeline().with_debug(debug_dir)?.run(img.clone())?;
        Ok(items.iter().filter_map(item_to_detection).collect())
    }
}

impl Default for LuminaireDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn item_to_detection(item: &StageData) -> Option<LampDetection> {
    let blob = LuminaireBlob {
        label: 0,
        min_x: item.get_int("blob_min_x")? as u32,
        min_y: item.get_int("blob_min_y")? as u32,
        max_x: item.get_int("blob_max_x")? as u32,
        max_y: item.get_int("blob_max_y")? as u32,
        pixel_count: item.get_int("pixel_count")? as u32,
    };
    Some(LampDetection {
        x: blob.min_x,
        y: blob.min_y,
        width: blob.width(),
        height: blob.height(),
        brightness: item.get_float("brightness")?,
        confidence: item.get_float("confidence")?,
    })
}
