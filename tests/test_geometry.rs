//! Tests for route geometry: haversine distances, compass bearings and
//! evenly spaced sampling along a path.

use lumiroute::models::GeoPoint;
use lumiroute::routing::{RoutePath, compass_bearing, haversine_m};

#[test]
fn test_haversine_known_distance() {
    // Downtown Boston block pair, roughly 625 m apart
    let a = GeoPoint::new(42.356280, -71.062290);
    let b = GeoPoint::new(42.351550, -71.058180);

    let d = haversine_m(a, b);
    assert!(
        (615.0..635.0).contains(&d),
        "expected ~625 m, got {:.1} m",
        d
    );

    assert_eq!(haversine_m(a, a), 0.0);
}

#[test]
fn test_compass_bearing_cardinals() {
    let origin = GeoPoint::new(0.0, 0.0);

    // Due north rounds to 0, which is reported as 360
    assert_eq!(compass_bearing(origin, GeoPoint::new(0.001, 0.0)), 360);
    assert_eq!(compass_bearing(origin, GeoPoint::new(0.0, 0.001)), 90);
    assert_eq!(compass_bearing(origin, GeoPoint::new(-0.001, 0.0)), 180);
    assert_eq!(compass_bearing(origin, GeoPoint::new(0.0, -0.001)), 270);
}

#[test]
fn test_path_rejects_degenerate_geometry() {
    assert!(RoutePath::from_lnglat(&[]).is_err());
    assert!(RoutePath::from_lnglat(&[(-71.06, 42.35)]).is_err());
}

#[test]
fn test_sample_spacing_and_count() -> anyhow::Result<()> {
    // Straight eastward path along the equator
    let path = RoutePath::from_lnglat(&[(0.0, 0.0), (0.004, 0.0)])?;

    let samples = path.sample(4)?;
    assert_eq!(samples.len(), 4);

    // First sample is the start; the endpoint itself is not included
    assert_eq!(samples[0].lng, 0.0);
    assert!((samples[1].lng - 0.001).abs() < 1e-9);
    assert!((samples[2].lng - 0.002).abs() < 1e-9);
    assert!((samples[3].lng - 0.003).abs() < 1e-9);

    assert!(path.sample(1).is_err());
    Ok(())
}

#[test]
fn test_sample_headings() -> anyhow::Result<()> {
    let path = RoutePath::from_lnglat(&[(0.0, 0.0), (0.004, 0.0)])?;

    let samples = path.sample_with_headings(4)?;
    assert_eq!(samples.len(), 4);

    for (_, heading) in &samples[..3] {
        assert_eq!(*heading, Some(90), "eastward path should head due east");
    }
    assert_eq!(samples[3].1, None, "final point has no heading");
    Ok(())
}

#[test]
fn test_point_at_interpolates_and_clamps() -> anyhow::Result<()> {
    let path = RoutePath::from_lnglat(&[(0.0, 0.0), (0.002, 0.0)])?;

    let mid = path.point_at(0.5);
    assert!((mid.lng - 0.001).abs() < 1e-9);
    assert_eq!(mid.lat, 0.0);

    let clamped = path.point_at(1.5);
    assert!((clamped.lng - 0.002).abs() < 1e-12);

    let start = path.point_at(-0.5);
    assert_eq!(start.lng, 0.0);
    Ok(())
}

#[test]
fn test_length_accumulates_over_vertices() -> anyhow::Result<()> {
    // Two equal eastward legs with a vertex in the middle
    let bent = RoutePath::from_lnglat(&[(0.0, 0.0), (0.001, 0.0), (0.002, 0.0)])?;
    let straight = RoutePath::from_lnglat(&[(0.0, 0.0), (0.002, 0.0)])?;

    assert!((bent.length_m() - straight.length_m()).abs() < 1e-6);
    assert!(straight.length_m() > 0.0);
    Ok(())
}
