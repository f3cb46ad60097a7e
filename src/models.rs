use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A connected bright region extracted from the luminance mask.
///
/// Coordinates are pixel positions in the original (unscaled) frame.
#[derive(Debug, Clone)]
pub struct LuminaireBlob {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl LuminaireBlob {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Approximate radius from the bounding box.
    pub fn radius(&self) -> f32 {
        (self.width() as f32 + self.height() as f32) / 4.0
    }

    pub fn aspect_ratio(&self) -> f32 {
        let h = self.height() as f32;
        if h == 0.0 {
            return 0.0;
        }
        self.width() as f32 / h
    }

    /// Fraction of the bounding box covered by mask pixels.
    /// A lamp head lights up as a filled blob, not a thin streak.
    pub fn compactness(&self) -> f32 {
        let area = (self.width() * self.height()) as f32;
        if area == 0.0 {
            return 0.0;
        }
        (self.pixel_count as f32 / area).min(1.0)
    }

    pub fn center(&self) -> (u32, u32) {
        ((self.min_x + self.max_x) / 2, (self.min_y + self.max_y) / 2)
    }

    pub fn is_reasonable_size(&self, min_radius: f32, max_radius: f32) -> bool {
        let r = self.radius();
        r >= min_radius && r <= max_radius
    }

    /// Mean luminance of the blob's bounding region in the source frame.
    pub fn mean_brightness(&self, img: &DynamicImage) -> f32 {
        let gray = img.to_luma8();
        let mut sum: u64 = 0;
        let mut count: u64 = 0;

        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                if x < gray.width() && y < gray.height() {
                    sum += gray.get_pixel(x, y)[0] as u64;
                    count += 1;
                }
            }
        }

        if count > 0 {
            sum as f32 / count as f32
        } else {
            0.0
        }
    }

    /// Composite detection confidence from brightness, fill and shape.
    ///
    /// `brightness` is the mean luminance of the blob region (0..=255).
    pub fn confidence(&self, brightness: f32) -> f32 {
        let aspect = self.aspect_ratio();
        let aspect_closeness = if aspect > 0.0 {
            (1.0 - aspect.ln().abs() / 2.5f32.ln()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let conf =
            0.5 * (brightness / 255.0) + 0.3 * self.compactness() + 0.2 * aspect_closeness;
        conf.clamp(0.0, 1.0)
    }

}

/// A detected street luminaire in original-image pixel coordinates.
#[derive(Debug, Clone)]
pub struct LampDetection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Mean luminance of the detection region, 0..=255.
    pub brightness: f32,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

impl LampDetection {
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}
