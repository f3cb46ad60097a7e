//! Integration tests for database constraint enforcement.
//!
//! Tests cover:
//! - Sample point seq uniqueness per route
//! - Detections require an existing sample point
//! - Observations survive route deletion with route_id cleared

mod common;

use common::*;

use lumiroute::core::db::{
    BoundRouteRepository, DetectionRepository, NewDetection, NewSamplePoint, ObservationKind,
    ObservationRepository, RouteRepository, SamplePointRepository,
};
use lumiroute::models::GeoPoint;

#[tokio::test]
async fn test_duplicate_seq_rejected() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;

    let duplicate = vec![
        NewSamplePoint {
            seq: 0,
            position: GeoPoint::new(42.3563, -71.0623),
            heading: Some(90),
        },
        NewSamplePoint {
            seq: 0,
            position: GeoPoint::new(42.3560, -71.0623),
            heading: None,
        },
    ];

    let result = repo.add_points(&duplicate).await;
    assert!(result.is_err(), "Duplicate seq should be rejected");
    let message = result.unwrap_err().to_string();
    assert!(
        message.contains("UNIQUE") || message.contains("unique"),
        "Error should mention the unique constraint, got: {}",
        message
    );

    // The failed transaction must not have left partial rows behind
    assert!(repo.get_points().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_detection_requires_sample_point() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;

    let result = repo
        .add_detections(
            5,
            &[NewDetection {
                x: 0,
                y: 0,
                width: 4,
                height: 4,
                brightness: 255.0,
                confidence: 0.9,
                verified: false,
            }],
        )
        .await;

    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(
        message.contains("No sample point"),
        "Error should name the missing point, got: {}",
        message
    );

    Ok(())
}

#[tokio::test]
async fn test_observation_survives_route_deletion() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;
    let route_id = repo.get_route().await?.id;

    let mut observation = make_test_observation(42.3563, -71.0623, ObservationKind::DarkSpot);
    observation.route_id = Some(route_id);
    let stored = db.add_observation(&observation).await?;
    assert_eq!(stored.route_id, Some(route_id));

    repo.delete().await?;

    // Feedback outlives the route it was reported on
    let all = db.get_observations().await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].route_id, None);

    Ok(())
}
