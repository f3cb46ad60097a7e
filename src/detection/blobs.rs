use crate::models::LuminaireBlob;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;

/// Find connected bright regions in a binary mask.
pub fn find_blobs(mask: &GrayImage, min_area: u32) -> Vec<LuminaireBlob> {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0]));

    // Accumulate bounds and pixel counts per label
    let mut regions: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }

        regions
            .entry(label_val)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    regions
        .into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, count))| LuminaireBlob {
            label,
            min_x,
            min_y,
            max_x,
            max_y,
            pixel_count: count,
        })
        .filter(|b| b.pixel_count >= min_area)
        .collect()
}
