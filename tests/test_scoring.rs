//! Tests for the light score aggregation: point illumination, feedback
//! adjustments, segment gap penalties and route-level scoring.

use lumiroute::core::db::ObservationKind;
use lumiroute::models::GeoPoint;
use lumiroute::scoring::{
    FeedbackPoint, PointSample, ScoreBand, adjusted_illumination, point_illumination,
    score_route,
};

/// ~35 m of latitude.
const LAT_STEP: f64 = 0.000315;

fn sample(lat: f64, illumination: Option<f64>) -> PointSample {
    PointSample {
        position: GeoPoint::new(lat, -71.0623),
        illumination,
    }
}

fn feedback(lat: f64, kind: ObservationKind, weight: f64) -> FeedbackPoint {
    FeedbackPoint {
        position: GeoPoint::new(lat, -71.0623),
        kind,
        weight,
    }
}

#[test]
fn test_point_illumination_curve() {
    assert_eq!(point_illumination(&[]), 0.0);

    let one = point_illumination(&[1.0]);
    assert!((one - 0.5507).abs() < 0.001, "got {}", one);

    let two = point_illumination(&[1.0, 1.0]);
    assert!(two > one, "extra lamps add light");
    assert!(two < 2.0 * one, "with diminishing returns");

    let many = point_illumination(&[1.0; 20]);
    assert!(many > 0.99 && many <= 1.0, "curve saturates at 1");
}

#[test]
fn test_fully_lit_route_scores_100() -> anyhow::Result<()> {
    let points = vec![
        sample(42.3563, Some(1.0)),
        sample(42.3563 - LAT_STEP, Some(1.0)),
        sample(42.3563 - 2.0 * LAT_STEP, Some(1.0)),
    ];

    let score = score_route(&points, &[])?;
    assert_eq!(score.route_score, 100.0);
    assert_eq!(score.band, ScoreBand::WellLit);
    assert_eq!(score.coverage, 1.0);
    assert_eq!(score.segments.len(), 2);
    Ok(())
}

#[test]
fn test_gap_penalty_for_sparse_samples() -> anyhow::Result<()> {
    // Two fully lit endpoints 80 m apart: the unlit middle drags it down
    let points = vec![
        sample(42.3563, Some(1.0)),
        sample(42.3563 - 0.000719, Some(1.0)),
    ];

    let score = score_route(&points, &[])?;
    assert!(
        (score.route_score - 50.0).abs() < 1.0,
        "expected ~50 from the 40m/80m gap factor, got {}",
        score.route_score
    );
    assert_eq!(score.band, ScoreBand::Moderate);
    Ok(())
}

#[test]
fn test_darkest_segment_and_weighting() -> anyhow::Result<()> {
    let points = vec![
        sample(42.3563, Some(1.0)),
        sample(42.3563 - LAT_STEP, Some(1.0)),
        sample(42.3563 - 2.0 * LAT_STEP, Some(0.0)),
    ];

    let score = score_route(&points, &[])?;
    assert!((score.route_score - 75.0).abs() < 1e-9);
    assert_eq!(score.darkest, Some(1));
    assert!((score.segments[1].score - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_missing_imagery_counts_as_dark() -> anyhow::Result<()> {
    let points = vec![
        sample(42.3563, Some(1.0)),
        sample(42.3563 - LAT_STEP, None),
        sample(42.3563 - 2.0 * LAT_STEP, Some(1.0)),
    ];

    let score = score_route(&points, &[])?;
    assert!((score.coverage - 2.0 / 3.0).abs() < 1e-9);
    assert!((score.route_score - 50.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_negative_feedback_lowers_nearby_point() {
    let point = sample(42.3563, Some(0.5));

    let adjusted = adjusted_illumination(
        &point,
        &[feedback(42.3563, ObservationKind::DarkSpot, 1.0)],
    );
    assert!((adjusted - 0.3).abs() < 1e-9);

    // An observation two samples away is out of the 25 m radius
    let far = adjusted_illumination(
        &point,
        &[feedback(42.3563 - 2.0 * LAT_STEP, ObservationKind::DarkSpot, 1.0)],
    );
    assert!((far - 0.5).abs() < 1e-9);
}

#[test]
fn test_positive_feedback_clamps_at_one() {
    let point = sample(42.3563, Some(0.95));

    let adjusted = adjusted_illumination(
        &point,
        &[
            feedback(42.3563, ObservationKind::WellLit, 1.0),
            feedback(42.3563, ObservationKind::NewLamp, 1.0),
        ],
    );
    assert_eq!(adjusted, 1.0);
}

#[test]
fn test_feedback_weight_scales_adjustment() {
    let point = sample(42.3563, Some(0.5));

    let adjusted = adjusted_illumination(
        &point,
        &[feedback(42.3563, ObservationKind::LampOut, 0.5)],
    );
    assert!((adjusted - 0.4).abs() < 1e-9);
}

#[test]
fn test_feedback_changes_route_score() -> anyhow::Result<()> {
    let points = vec![
        sample(42.3563, Some(0.5)),
        sample(42.3563 - LAT_STEP, Some(0.5)),
    ];

    let baseline = score_route(&points, &[])?;
    assert!((baseline.route_score - 50.0).abs() < 1e-9);

    let with_report = score_route(
        &points,
        &[feedback(42.3563, ObservationKind::DarkSpot, 1.0)],
    )?;
    assert!((with_report.route_score - 40.0).abs() < 1e-9);
    assert_eq!(with_report.band, ScoreBand::Poor);
    Ok(())
}

#[test]
fn test_scoring_edge_cases() {
    // A single point is not a route
    assert!(score_route(&[sample(42.3563, Some(1.0))], &[]).is_err());

    // Identical points have zero length
    let stacked = vec![sample(42.3563, Some(1.0)), sample(42.3563, Some(1.0))];
    assert!(score_route(&stacked, &[]).is_err());
}

#[test]
fn test_band_thresholds() {
    assert_eq!(ScoreBand::from_score(100.0), ScoreBand::WellLit);
    assert_eq!(ScoreBand::from_score(70.0), ScoreBand::WellLit);
    assert_eq!(ScoreBand::from_score(69.9), ScoreBand::Moderate);
    assert_eq!(ScoreBand::from_score(45.0), ScoreBand::Moderate);
    assert_eq!(ScoreBand::from_score(44.9), ScoreBand::Poor);
    assert_eq!(ScoreBand::from_score(20.0), ScoreBand::Poor);
    assert_eq!(ScoreBand::from_score(19.9), ScoreBand::Unlit);
    assert_eq!(ScoreBand::from_score(0.0), ScoreBand::Unlit);
}
