//! Integration tests for route, sample point and detection CRUD.
//!
//! Tests cover:
//! - Adding routes and reading them back
//! - Sample point insertion, illumination and imagery round-trips
//! - Detection persistence per point
//! - Partial route updates and cascading deletes
//! - Archive save/reopen durability

mod common;

use common::*;

use lumiroute::core::db::{
    BoundRouteRepository, DetectionRepository, NewDetection, RouteRepository, RouteUpdate,
    SamplePointRepository, SurveyDb, SurveyRepository, UpdateSurveySettings,
};

#[tokio::test]
async fn test_add_route_and_list() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    let repo = db.add_route(make_test_route("Night walk home")).await?;
    let route = repo.get_route().await?;

    assert!(route.id > 0);
    assert_eq!(route.name, "Night walk home");
    assert_eq!(route.profile, "foot-walking");
    assert_eq!(route.distance_m, 625.0);
    assert_eq!(route.light_score, None);
    assert_eq!(route.coverage, None);
    assert_eq!(repo.geometry(), make_test_geometry().as_slice());

    let routes = db.get_routes().await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, route.id);

    Ok(())
}

#[tokio::test]
async fn test_sample_points_roundtrip() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;

    repo.add_points(&make_test_points(3)).await?;

    let points = repo.get_points().await?;
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].seq, 0);
    assert_eq!(points[2].seq, 2);
    assert_eq!(points[0].heading, Some(180));
    assert_eq!(points[2].heading, None, "last point has no heading");
    assert!(points.iter().all(|p| p.illumination.is_none()));
    assert!(points.iter().all(|p| p.image_fname.is_none()));

    repo.set_point_illumination(1, 0.8).await?;
    let points = repo.get_points().await?;
    assert_eq!(points[1].illumination, Some(0.8));
    assert_eq!(points[0].illumination, None);

    // Unknown seq is an error, not a silent no-op
    let result = repo.set_point_illumination(99, 0.5).await;
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_point_image_roundtrip() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;
    repo.add_points(&make_test_points(2)).await?;

    let fname = repo.set_point_image(0, &test_image_bytes(), "jpg").await?;
    assert!(fname.ends_with(".jpg"));

    let points = repo.get_points().await?;
    assert_eq!(points[0].image_fname.as_deref(), Some(fname.as_str()));

    let img = repo
        .load_point_image(0)
        .await?
        .expect("image should be stored");
    assert_eq!(img.width(), 32);
    assert_eq!(img.height(), 32);

    // Point exists but carries no image
    assert!(repo.load_point_image(1).await?.is_none());

    // Point does not exist
    assert!(repo.set_point_image(99, &test_image_bytes(), "jpg").await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_detections_roundtrip() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;
    repo.add_points(&make_test_points(2)).await?;

    let detections = vec![
        NewDetection {
            x: 100,
            y: 40,
            width: 12,
            height: 14,
            brightness: 244.0,
            confidence: 0.91,
            verified: false,
        },
        NewDetection {
            x: 250,
            y: 60,
            width: 8,
            height: 8,
            brightness: 230.0,
            confidence: 0.48,
            verified: true,
        },
    ];
    repo.add_detections(0, &detections).await?;

    let stored = repo.get_detections().await?;
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|d| d.point_seq == 0));
    assert_eq!(stored[0].x, 100);
    assert_eq!(stored[0].verified, false);
    assert_eq!(stored[1].verified, true);
    assert!((stored[1].confidence - 0.48).abs() < 1e-9);

    repo.clear_detections(0).await?;
    assert!(repo.get_detections().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_update_route_score() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;

    let updated = repo
        .update_route(&RouteUpdate {
            light_score: Some(Some(72.5)),
            coverage: Some(Some(0.9)),
            ..Default::default()
        })
        .await?;
    assert_eq!(updated.light_score, Some(72.5));
    assert_eq!(updated.coverage, Some(0.9));

    // A name-only update leaves the score in place
    let renamed = repo
        .update_route(&RouteUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(renamed.light_score, Some(72.5));

    Ok(())
}

#[tokio::test]
async fn test_delete_route_cascades() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;
    let repo = db.add_route(make_test_route("Test")).await?;
    let route_id = repo.get_route().await?.id;
    repo.add_points(&make_test_points(2)).await?;
    repo.set_point_image(0, &test_image_bytes(), "jpg").await?;
    repo.add_detections(
        0,
        &[NewDetection {
            x: 1,
            y: 1,
            width: 4,
            height: 4,
            brightness: 250.0,
            confidence: 0.8,
            verified: false,
        }],
    )
    .await?;

    repo.delete().await?;

    assert!(db.get_routes().await?.is_empty());
    assert!(db.get_route_repo(route_id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_survey_archive_roundtrip() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("roundtrip.lumiroute");

    let route_id = {
        let db = SurveyDb::new(&path).await?;
        let repo = db.add_route(make_test_route("Persisted")).await?;
        repo.add_points(&make_test_points(2)).await?;
        repo.set_point_image(0, &test_image_bytes(), "jpg").await?;
        let id = repo.get_route().await?.id;
        db.save_survey().await?;
        id
    };

    // Reopen from the packed archive
    let db = SurveyDb::new(&path).await?;
    let routes = db.get_routes().await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].name, "Persisted");

    let repo = db.get_route_repo(route_id).await?;
    let img = repo
        .load_point_image(0)
        .await?
        .expect("image should survive the archive round-trip");
    assert_eq!(img.width(), 32);

    Ok(())
}

#[tokio::test]
async fn test_survey_settings() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    assert_eq!(db.get_survey_name().await?, "survey");
    assert_eq!(db.get_default_samples().await?, 100);

    db.set_survey_settings(UpdateSurveySettings {
        name: Some("Riverside audit".to_string()),
        default_samples: Some(50),
        created_at: None,
    })
    .await?;

    assert_eq!(db.get_survey_name().await?, "Riverside audit");
    assert_eq!(db.get_default_samples().await?, 50);
    db.get_survey_created_at().await?;

    Ok(())
}
