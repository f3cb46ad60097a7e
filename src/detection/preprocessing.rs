use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce sensor noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Binary mask of pixels at or above the luminance threshold.
/// At night a lamp head saturates the sensor, so the mask isolates
/// luminaires from the rest of the scene.
pub fn bright_mask(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] >= threshold {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}
