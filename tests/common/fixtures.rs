use image::{ImageBuffer, Luma, Rgb};
use lumiroute::core::db::{
    NewObservation, NewRoute, NewSamplePoint, ObservationKind, SurveyDb,
};
use lumiroute::models::GeoPoint;

/// Creates a SurveyDb backed by a temporary archive file.
/// Returns both the db and the temp directory (which must be kept alive).
pub async fn create_test_survey() -> (SurveyDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("test.lumiroute");
    let db = SurveyDb::new(&path)
        .await
        .expect("Failed to create test survey");
    (db, dir)
}

/// Straight two-point test geometry in provider (lng, lat) order.
pub fn make_test_geometry() -> Vec<(f64, f64)> {
    vec![(-71.062290, 42.356280), (-71.058180, 42.351550)]
}

pub fn make_test_route(name: &str) -> NewRoute {
    NewRoute {
        name: name.to_string(),
        profile: "foot-walking".to_string(),
        start: GeoPoint::new(42.356280, -71.062290),
        end: GeoPoint::new(42.351550, -71.058180),
        distance_m: 625.0,
        duration_s: 450.0,
        geometry: make_test_geometry(),
    }
}

/// `n` sample points roughly 33 m apart heading south; the last one has no
/// heading, matching how routes are sampled.
pub fn make_test_points(n: usize) -> Vec<NewSamplePoint> {
    (0..n)
        .map(|i| NewSamplePoint {
            seq: i as i64,
            position: GeoPoint::new(42.3563 - 0.0003 * i as f64, -71.0623),
            heading: if i + 1 < n { Some(180) } else { None },
        })
        .collect()
}

pub fn make_test_observation(lat: f64, lng: f64, kind: ObservationKind) -> NewObservation {
    NewObservation {
        route_id: None,
        position: GeoPoint::new(lat, lng),
        kind,
        note: Some("test observation".to_string()),
        weight: 1.0,
    }
}

/// Small JPEG byte buffer standing in for a fetched street-level image.
pub fn test_image_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_fn(32, 32, |_, _| Rgb([10u8, 10u8, 10u8]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// Near-black night frame with a filled bright disc at (cx, cy).
pub fn night_frame_with_disc(
    width: u32,
    height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> image::DynamicImage {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx as f32;
        let dy = y as f32 - cy as f32;
        if (dx * dx + dy * dy).sqrt() <= radius as f32 {
            Luma([255u8])
        } else {
            Luma([5u8])
        }
    });
    image::DynamicImage::ImageLuma8(img)
}
