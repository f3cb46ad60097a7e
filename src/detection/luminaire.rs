use crate::models::LuminaireBlob;
use image::DynamicImage;

/// Geometric screen: size, aspect and fill of a plausible lamp head.
pub fn filter_candidates(
    blobs: &[LuminaireBlob],
    min_radius: f32,
    max_radius: f32,
    min_compactness: f32,
) -> Vec<LuminaireBlob> {
    blobs
        .iter()
        .filter(|b| {
            let aspect = b.aspect_ratio();
            b.is_reasonable_size(min_radius, max_radius)
                && b.compactness() >= min_compactness
                && aspect >= 0.4
                && aspect <= 2.5
        })
        .cloned()
        .collect()
}

/// Keep blobs whose region in the source frame is actually bright.
pub fn filter_bright(
    blobs: &[LuminaireBlob],
    img: &DynamicImage,
    brightness_threshold: f32,
) -> Vec<LuminaireBlob> {
    blobs
        .iter()
        .filter(|b| b.mean_brightness(img) >= brightness_threshold)
        .cloned()
        .collect()
}

/// Keep blobs whose centroid sits above the elevation cutoff line.
/// Lamp heads hang above the horizon; bright patches low in the frame are
/// reflections on pavement or vehicle lights.
pub fn filter_elevated(
    blobs: &[LuminaireBlob],
    frame_height: u32,
    elevation_cutoff: f32,
) -> Vec<LuminaireBlob> {
    let cutoff_y = frame_height as f32 * elevation_cutoff;
    blobs
        .iter()
        .filter(|b| (b.center().1 as f32) <= cutoff_y)
        .cloned()
        .collect()
}
