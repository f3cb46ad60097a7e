use crate::detection::{blobs, preprocessing};
use crate::models::LuminaireBlob;
use crate::pipeline::{MetaValue, PipelineStage, Region, StageContext, StageData};
use anyhow::Result;

/// Convert frame to grayscale
pub struct GrayscaleStage;

impl PipelineStage for GrayscaleStage {
    fn process(&self, data: Vec<StageData>, _context: &StageContext) -> Result<Vec<StageData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = preprocessing::to_grayscale(&item.image);
            let new_item = StageData {
                image: image::DynamicImage::ImageLuma8(gray),
                original: item.original.clone(),
                region: item.region.clone(),
                metadata: item.metadata.clone(),
            };
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Apply Gaussian blur
pub struct BlurStage {
    pub sigma: f32,
}

impl PipelineStage for BlurStage {
    fn process(&self, data: Vec<StageData>, _context: &StageContext) -> Result<Vec<StageData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let blurred = preprocessing::apply_blur(&gray, self.sigma);
            let new_item = StageData {
                image: image::DynamicImage::ImageLuma8(blurred),
                original: item.original.clone(),
                region: item.region.clone(),
                metadata: item.metadata.clone(),
            };
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Threshold the frame into a binary mask of saturated pixels
pub struct BrightMaskStage {
    pub threshold: u8,
}

impl PipelineStage for BrightMaskStage {
    fn process(&self, data: Vec<StageData>, _context: &StageContext) -> Result<Vec<StageData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let mask = preprocessing::bright_mask(&gray, self.threshold);
            let new_item = StageData {
                image: image::DynamicImage::ImageLuma8(mask),
                original: item.original.clone(),
                region: item.region.clone(),
                metadata: item.metadata.clone(),
            };
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Bright Mask"
    }
}

/// Split the mask into per-blob items - one candidate region each
pub struct BlobSplitStage {
    pub min_area: u32,
    pub padding: u32,
}

impl PipelineStage for BlobSplitStage {
    fn process(&self, data: Vec<StageData>, _context: &StageContext) -> Result<Vec<StageData>> {
        let mut result = Vec::new();

        for item in data {
            let mask = item.image.to_luma8();
            let detected = blobs::find_blobs(&mask, self.min_area);
            let img_width = item.original.width();
            let img_height = item.original.height();

            // Each blob becomes its own StageData
            for blob in detected {
                let padded_x = blob.min_x.saturating_sub(self.padding);
                let padded_y = blob.min_y.saturating_sub(self.padding);
                let padded_max_x = (blob.max_x + self.padding).min(img_width - 1);
                let padded_max_y = (blob.max_y + self.padding).min(img_height - 1);

                let region = Region {
                    x: padded_x,
                    y: padded_y,
                    width: padded_max_x - padded_x + 1,
                    height: padded_max_y - padded_y + 1,
                };

                let cropped =
                    item.original
                        .crop_imm(region.x, region.y, region.width, region.height);

                let mut blob_item =
                    StageData::from_region(cropped, item.original.clone(), region);
                blob_item.set("blob_min_x", MetaValue::Int(blob.min_x as i32));
                blob_item.set("blob_min_y", MetaValue::Int(blob.min_y as i32));
                blob_item.set("blob_max_x", MetaValue::Int(blob.max_x as i32));
                blob_item.set("blob_max_y", MetaValue::Int(blob.max_y as i32));
                blob_item.set("pixel_count", MetaValue::Int(blob.pixel_count as i32));
                blob_item.set("radius", MetaValue::Float(blob.radius()));
                blob_item.set("aspect_ratio", MetaValue::Float(blob.aspect_ratio()));
                blob_item.set("compactness", MetaValue::Float(blob.compactness()));

                result.push(blob_item);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Blob Split"
    }
}

/// Filter candidate blobs down to plausible luminaires and score them
pub struct LuminaireFilterStage {
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_compactness: f32,
    pub brightness_threshold: f32,
    pub elevation_cutoff: f32,
}

impl LuminaireFilterStage {
    fn blob_from_metadata(item: &StageData) -> Result<LuminaireBlob> {
        let get = |key: &str| -> Result<u32> {
            item.get_int(key)
                .map(|v| v as u32)
                .ok_or_else(|| anyhow::anyhow!("Missing {}", key))
        };
        Ok(LuminaireBlob {
            label: 0, // Not needed past blob split
            min_x: get("blob_min_x")?,
            min_y: get("blob_min_y")?,
            max_x: get("blob_max_x")?,
            max_y: get("blob_max_y")?,
            pixel_count: get("pixel_count")?,
        })
    }
}

impl PipelineStage for LuminaireFilterStage {
    fn process(&self, data: Vec<StageData>, _context: &StageContext) -> Result<Vec<StageData>> {
        let mut result = Vec::new();

        for item in data {
            let blob = Self::blob_from_metadata(&item)?;

            let aspect = blob.aspect_ratio();
            let plausible_shape = blob.is_reasonable_size(self.min_radius, self.max_radius)
                && blob.compactness() >= self.min_compactness
                && aspect >= 0.4
                && aspect <= 2.5;
            if !plausible_shape {
                continue;
            }

            let frame_height = item.original.height();
            let cutoff_y = frame_height as f32 * self.elevation_cutoff;
            if blob.center().1 as f32 > cutoff_y {
                continue;
            }

            let brightness = blob.mean_brightness(&item.original);
            if brightness < self.brightness_threshold {
                continue;
            }

            let mut new_item = item.clone();
            new_item.set("is_luminaire", MetaValue::Bool(true));
            new_item.set("brightness", MetaValue::Float(brightness));
            new_item.set("confidence", MetaValue::Float(blob.confidence(brightness)));
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Luminaire Filter"
    }
}
