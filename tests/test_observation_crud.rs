//! Integration tests for feedback observation CRUD.
//!
//! Tests cover:
//! - Adding and listing observations
//! - Proximity queries
//! - Weight validation
//! - Deletion

mod common;

use common::*;

use lumiroute::core::db::{NewObservation, ObservationKind, ObservationRepository};
use lumiroute::models::GeoPoint;

#[tokio::test]
async fn test_add_and_list_observations() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    let observation = db
        .add_observation(&make_test_observation(42.3563, -71.0623, ObservationKind::LampOut))
        .await?;

    assert!(observation.id > 0);
    assert_eq!(observation.kind, ObservationKind::LampOut);
    assert_eq!(observation.route_id, None);
    assert_eq!(observation.weight, 1.0);
    assert_eq!(observation.note.as_deref(), Some("test observation"));

    db.add_observation(&make_test_observation(42.3570, -71.0630, ObservationKind::WellLit))
        .await?;

    let all = db.get_observations().await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, observation.id);
    assert_eq!(all[1].kind, ObservationKind::WellLit);

    Ok(())
}

#[tokio::test]
async fn test_observations_near() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    let center = GeoPoint::new(42.3563, -71.0623);
    // ~11 m north of center
    db.add_observation(&make_test_observation(42.35640, -71.0623, ObservationKind::DarkSpot))
        .await?;
    // ~330 m south of center
    db.add_observation(&make_test_observation(42.35330, -71.0623, ObservationKind::DarkSpot))
        .await?;

    let near = db.get_observations_near(center, 25.0).await?;
    assert_eq!(near.len(), 1);

    let wide = db.get_observations_near(center, 500.0).await?;
    assert_eq!(wide.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_observation_weight_validated() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    let result = db
        .add_observation(&NewObservation {
            route_id: None,
            position: GeoPoint::new(42.0, -71.0),
            kind: ObservationKind::WellLit,
            note: None,
            weight: 1.5,
        })
        .await;

    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(
        message.contains("weight"),
        "Error should mention the weight, got: {}",
        message
    );

    Ok(())
}

#[tokio::test]
async fn test_delete_observation() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_survey().await;

    let observation = db
        .add_observation(&make_test_observation(42.3563, -71.0623, ObservationKind::NewLamp))
        .await?;
    assert_eq!(db.get_observations().await?.len(), 1);

    db.delete_observation(observation).await?;
    assert!(db.get_observations().await?.is_empty());

    Ok(())
}

#[test]
fn test_observation_kind_conversions() {
    for kind in [
        ObservationKind::LampOut,
        ObservationKind::DarkSpot,
        ObservationKind::WellLit,
        ObservationKind::NewLamp,
    ] {
        let encoded = i64::from(kind);
        let decoded = ObservationKind::try_from(encoded).expect("valid encoding");
        assert_eq!(decoded, kind);

        let parsed: ObservationKind = kind.as_str().parse().expect("valid kind name");
        assert_eq!(parsed, kind);
    }

    assert!(ObservationKind::try_from(42).is_err());
    assert!("floodlight".parse::<ObservationKind>().is_err());

    assert!(!ObservationKind::LampOut.is_positive());
    assert!(!ObservationKind::DarkSpot.is_positive());
    assert!(ObservationKind::WellLit.is_positive());
    assert!(ObservationKind::NewLamp.is_positive());
}
