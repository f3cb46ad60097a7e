mod detection;
mod meta;
mod observation;
mod point;
mod route;
mod state;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Ok};
use image::DynamicImage;
use sqlx::{Connection, Row, sqlite::SqliteRow};
use state::SurveyState;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::models::GeoPoint;
use crate::routing::geometry::haversine_m;

pub use detection::{DetectionRepository, NewDetection, StoredDetection};
pub use meta::{SurveyRepository, UpdateSurveySettings};
pub use observation::{NewObservation, Observation, ObservationKind, ObservationRepository};
pub use point::{NewSamplePoint, SamplePoint, SamplePointRepository};
pub use route::{BoundRouteRepository, NewRoute, Route, RouteRepository, RouteUpdate};

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_194.9;

#[derive(Debug)]
pub struct SurveyDb {
    state: Arc<SurveyState>,
}

impl SurveyDb {
    pub async fn new<P: AsRef<Path>>(survey_file: P) -> anyhow::Result<Self> {
        let db = Self {
            state: Arc::new(SurveyState::new(survey_file).await?),
        };
        db.seed_defaults().await?;
        Ok(db)
    }

    /// Explicitly pack the survey back into its archive file.
    /// Mutations are only durable after this call.
    pub async fn save_survey(&self) -> anyhow::Result<()> {
        self.state.save_survey().await
    }

    async fn seed_defaults(&self) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        for (key, value) in [
            ("name", "survey".to_string()),
            ("created_at", created_at),
            ("default_samples", "100".to_string()),
        ] {
            sqlx::query(
                r#"INSERT INTO survey_metadata (key, value) VALUES ($1, $2)
                ON CONFLICT (key) DO NOTHING"#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut **conn)
            .await?;
        }
        Ok(())
    }
}

/// Repository bound to a single route. Holds the decoded route geometry so
/// export and re-sampling never re-parse it.
pub struct RouteDb {
    state: Arc<SurveyState>,
    route_id: i64,
    geometry: Vec<(f64, f64)>,
}

impl std::fmt::Debug for RouteDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDb")
            .field("route_id", &self.route_id)
            .field("state", &self.state)
            .finish()
    }
}

fn route_from_row(row: &SqliteRow) -> anyhow::Result<Route> {
    Ok(Route {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        profile: row.try_get("profile")?,
        start: GeoPoint {
            lat: row.try_get("start_lat")?,
            lng: row.try_get("start_lng")?,
        },
        end: GeoPoint {
            lat: row.try_get("end_lat")?,
            lng: row.try_get("end_lng")?,
        },
        distance_m: row.try_get("distance_m")?,
        duration_s: row.try_get("duration_s")?,
        light_score: row.try_get("light_score")?,
        coverage: row.try_get("coverage")?,
        _guard: (),
    })
}

fn point_from_row(row: &SqliteRow) -> anyhow::Result<SamplePoint> {
    let heading: Option<i64> = row.try_get("heading")?;
    Ok(SamplePoint {
        id: row.try_get("id")?,
        route_id: row.try_get("route_id")?,
        seq: row.try_get("seq")?,
        position: GeoPoint {
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
        },
        heading: heading.map(|h| {
            h.try_into()
                .expect("heading bounded by database constraint")
        }),
        image_fname: row.try_get("image_fname")?,
        illumination: row.try_get("illumination")?,
        _guard: (),
    })
}

fn observation_from_row(row: &SqliteRow) -> anyhow::Result<Observation> {
    let kind: i64 = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Observation {
        id: row.try_get("id")?,
        route_id: row.try_get("route_id")?,
        position: GeoPoint {
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
        },
        kind: ObservationKind::try_from(kind)?,
        note: row.try_get("note")?,
        weight: row.try_get("weight")?,
        created_at: OffsetDateTime::parse(&created_at, &Rfc3339)?,
        _guard: (),
    })
}

fn detection_from_row(row: &SqliteRow) -> anyhow::Result<StoredDetection> {
    let coord = |key: &str| -> anyhow::Result<u32> {
        let value: i64 = row.try_get(key)?;
        Ok(value
            .try_into()
            .expect("pixel coordinate bounded by database constraint"))
    };
    let verified: i64 = row.try_get("verified")?;
    Ok(StoredDetection {
        id: row.try_get("id")?,
        point_seq: row.try_get("point_seq")?,
        x: coord("x")?,
        y: coord("y")?,
        width: coord("width")?,
        height: coord("height")?,
        brightness: row.try_get("brightness")?,
        confidence: row.try_get("confidence")?,
        verified: verified != 0,
        _guard: (),
    })
}

impl SurveyRepository for SurveyDb {
    async fn get_survey_name(&self) -> anyhow::Result<String> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(r#"SELECT value FROM survey_metadata WHERE key = 'name'"#)
            .fetch_one(&mut **conn)
            .await?;
        Ok(row.try_get("value")?)
    }

    async fn get_survey_created_at(&self) -> anyhow::Result<OffsetDateTime> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(r#"SELECT value FROM survey_metadata WHERE key = 'created_at'"#)
            .fetch_one(&mut **conn)
            .await?;
        let created_at_str: String = row.try_get("value")?;
        let created_at = OffsetDateTime::parse(&created_at_str, &Rfc3339)?;
        Ok(created_at)
    }

    async fn get_default_samples(&self) -> anyhow::Result<u64> {
        let mut conn = self.state.conn().await?;
        let row =
            sqlx::query(r#"SELECT value FROM survey_metadata WHERE key = 'default_samples'"#)
                .fetch_one(&mut **conn)
                .await?;
        let value: String = row.try_get("value")?;
        Ok(value.parse()?)
    }

    async fn set_survey_settings(&self, settings: UpdateSurveySettings) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let mut items = vec![];
        if let Some(name) = settings.name {
            items.push(("name", name));
        }
        if let Some(default_samples) = settings.default_samples {
            items.push(("default_samples", default_samples.to_string()));
        }
        if let Some(created_at) = settings.created_at {
            items.push(("created_at", created_at.format(&Rfc3339)?));
        }
        for (key, value) in items {
            sqlx::query(
                r#"INSERT INTO survey_metadata (key, value) VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut **conn)
            .await?;
        }
        Ok(())
    }
}

impl RouteRepository for SurveyDb {
    type Repository = RouteDb;

    fn get_route_repo(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = anyhow::Result<Self::Repository>> + 'static {
        let state = self.state.clone();
        async move {
            let mut conn = state.conn().await?;
            let row = sqlx::query("SELECT geometry FROM route WHERE id = $1")
                .bind(id)
                .fetch_one(&mut **conn)
                .await
                .with_context(|| format!("No route with id {}", id))?;
            let geometry_json: String = row.try_get("geometry")?;
            let geometry: Vec<(f64, f64)> = serde_json::from_str(&geometry_json)
                .context("Corrupt route geometry")?;
            Ok(RouteDb {
                state: state.clone(),
                route_id: id,
                geometry,
            })
        }
    }

    async fn add_route(&self, route: NewRoute) -> anyhow::Result<RouteDb> {
        let state = self.state.clone();
        let mut conn = state.conn().await?;
        let geometry_json = serde_json::to_string(&route.geometry)?;
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let row = sqlx::query(
            r#"INSERT INTO route
                (name, profile, start_lat, start_lng, end_lat, end_lng,
                 distance_m, duration_s, geometry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id"#,
        )
        .bind(&route.name)
        .bind(&route.profile)
        .bind(route.start.lat)
        .bind(route.start.lng)
        .bind(route.end.lat)
        .bind(route.end.lng)
        .bind(route.distance_m)
        .bind(route.duration_s)
        .bind(&geometry_json)
        .bind(created_at)
        .fetch_one(&mut **conn)
        .await?;
        let route_id: i64 = row.try_get("id")?;
        Ok(RouteDb {
            state: state.clone(),
            route_id,
            geometry: route.geometry,
        })
    }

    async fn get_routes(&self) -> anyhow::Result<Vec<Route>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT id, name, profile, start_lat, start_lng, end_lat, end_lng,
                distance_m, duration_s, light_score, coverage
            FROM route ORDER BY id ASC"#,
        )
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(route_from_row)
        .collect()
    }
}

impl BoundRouteRepository for RouteDb {
    async fn get_route(&self) -> anyhow::Result<Route> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            r#"SELECT id, name, profile, start_lat, start_lng, end_lat, end_lng,
                distance_m, duration_s, light_score, coverage
            FROM route WHERE id = $1"#,
        )
        .bind(self.route_id)
        .fetch_one(&mut **conn)
        .await?;
        route_from_row(&row)
    }

    async fn update_route(&self, update: &RouteUpdate) -> anyhow::Result<Route> {
        let current = self.get_route().await?;
        let light_score = match update.light_score {
            Some(v) => v,
            None => current.light_score,
        };
        let coverage = match update.coverage {
            Some(v) => v,
            None => current.coverage,
        };
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            r#"UPDATE route SET
                name = COALESCE($1, name),
                light_score = $2,
                coverage = $3
            WHERE id = $4
            RETURNING id, name, profile, start_lat, start_lng, end_lat, end_lng,
                distance_m, duration_s, light_score, coverage"#,
        )
        .bind(&update.name)
        .bind(light_score)
        .bind(coverage)
        .bind(self.route_id)
        .fetch_one(&mut **conn)
        .await?;
        route_from_row(&row)
    }

    fn geometry(&self) -> &[(f64, f64)] {
        &self.geometry
    }

    async fn delete(self) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let fnames: Vec<String> = sqlx::query(
            r#"SELECT image_fname FROM sample_point
            WHERE route_id = $1 AND image_fname IS NOT NULL"#,
        )
        .bind(self.route_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(|row| row.try_get("image_fname"))
        .collect::<Result<_, _>>()?;

        sqlx::query("DELETE FROM route WHERE id = $1")
            .bind(self.route_id)
            .execute(&mut **conn)
            .await?;
        drop(conn);

        for fname in fnames {
            if let Err(e) = self.state.delete_image(&fname).await {
                warn!(fname, error = %e, "failed to remove stored image");
            }
        }
        Ok(())
    }
}

impl SamplePointRepository for RouteDb {
    async fn add_points(&self, points: &[NewSamplePoint]) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        for point in points {
            let heading = point.heading.map(|h| h as i64);
            sqlx::query(
                r#"INSERT INTO sample_point (route_id, seq, lat, lng, heading)
                VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(self.route_id)
            .bind(point.seq)
            .bind(point.position.lat)
            .bind(point.position.lng)
            .bind(heading)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_points(&self) -> anyhow::Result<Vec<SamplePoint>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT id, route_id, seq, lat, lng, heading, image_fname, illumination
            FROM sample_point WHERE route_id = $1 ORDER BY seq ASC"#,
        )
        .bind(self.route_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(point_from_row)
        .collect()
    }

    async fn set_point_image(
        &self,
        seq: i64,
        bytes: &[u8],
        extension: &str,
    ) -> anyhow::Result<String> {
        let fname = self.state.store_image_bytes(bytes, extension).await?;
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(
            r#"UPDATE sample_point SET image_fname = $1 WHERE route_id = $2 AND seq = $3"#,
        )
        .bind(&fname)
        .bind(self.route_id)
        .bind(seq)
        .execute(&mut **conn)
        .await?;
        if result.rows_affected() == 0 {
            drop(conn);
            // The stored file would otherwise leak into the archive
            let _ = self.state.delete_image(&fname).await;
            anyhow::bail!("No sample point with seq {} on route {}", seq, self.route_id);
        }
        Ok(fname)
    }

    async fn load_point_image(&self, seq: i64) -> anyhow::Result<Option<DynamicImage>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            r#"SELECT image_fname FROM sample_point WHERE route_id = $1 AND seq = $2"#,
        )
        .bind(self.route_id)
        .bind(seq)
        .fetch_optional(&mut **conn)
        .await?
        .with_context(|| format!("No sample point with seq {} on route {}", seq, self.route_id))?;
        let fname: Option<String> = row.try_get("image_fname")?;
        drop(conn);
        match fname {
            Some(fname) => Ok(Some(self.state.load_image(&fname).await?)),
            None => Ok(None),
        }
    }

    async fn set_point_illumination(&self, seq: i64, illumination: f64) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(
            r#"UPDATE sample_point SET illumination = $1 WHERE route_id = $2 AND seq = $3"#,
        )
        .bind(illumination.clamp(0.0, 1.0))
        .bind(self.route_id)
        .bind(seq)
        .execute(&mut **conn)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("No sample point with seq {} on route {}", seq, self.route_id);
        }
        Ok(())
    }
}

impl DetectionRepository for RouteDb {
    async fn add_detections(&self, seq: i64, detections: &[NewDetection]) -> anyhow::Result<()> {
        if detections.is_empty() {
            return Ok(());
        }
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            r#"SELECT id FROM sample_point WHERE route_id = $1 AND seq = $2"#,
        )
        .bind(self.route_id)
        .bind(seq)
        .fetch_optional(&mut **conn)
        .await?
        .with_context(|| format!("No sample point with seq {} on route {}", seq, self.route_id))?;
        let point_id: i64 = row.try_get("id")?;

        let mut tx = conn.begin().await?;
        for det in detections {
            sqlx::query(
                r#"INSERT INTO detection
                    (point_id, x, y, width, height, brightness, confidence, verified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            )
            .bind(point_id)
            .bind(det.x as i64)
            .bind(det.y as i64)
            .bind(det.width as i64)
            .bind(det.height as i64)
            .bind(det.brightness)
            .bind(det.confidence)
            .bind(det.verified as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_detections(&self) -> anyhow::Result<Vec<StoredDetection>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT
                d.id, sp.seq AS point_seq,
                d.x, d.y, d.width, d.height, d.brightness, d.confidence, d.verified
            FROM detection d
            JOIN sample_point sp ON d.point_id = sp.id
            WHERE sp.route_id = $1
            ORDER BY sp.seq ASC, d.id ASC"#,
        )
        .bind(self.route_id)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(detection_from_row)
        .collect()
    }

    async fn clear_detections(&self, seq: i64) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"DELETE FROM detection WHERE point_id IN (
                SELECT id FROM sample_point WHERE route_id = $1 AND seq = $2
            )"#,
        )
        .bind(self.route_id)
        .bind(seq)
        .execute(&mut **conn)
        .await?;
        Ok(())
    }
}

impl ObservationRepository for SurveyDb {
    async fn add_observation(&self, observation: &NewObservation) -> anyhow::Result<Observation> {
        if !(0.0..=1.0).contains(&observation.weight) {
            anyhow::bail!(
                "observation weight must be in [0, 1], got {}",
                observation.weight
            );
        }
        let mut conn = self.state.conn().await?;
        let created_at = OffsetDateTime::now_utc();
        let kind = i64::from(observation.kind);
        let row = sqlx::query(
            r#"INSERT INTO observation (route_id, lat, lng, kind, note, weight, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id"#,
        )
        .bind(observation.route_id)
        .bind(observation.position.lat)
        .bind(observation.position.lng)
        .bind(kind)
        .bind(&observation.note)
        .bind(observation.weight)
        .bind(created_at.format(&Rfc3339)?)
        .fetch_one(&mut **conn)
        .await?;
        Ok(Observation {
            id: row.try_get("id")?,
            route_id: observation.route_id,
            position: observation.position,
            kind: observation.kind,
            note: observation.note.clone(),
            weight: observation.weight,
            created_at,
            _guard: (),
        })
    }

    async fn get_observations(&self) -> anyhow::Result<Vec<Observation>> {
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"SELECT id, route_id, lat, lng, kind, note, weight, created_at
            FROM observation ORDER BY id ASC"#,
        )
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(observation_from_row)
        .collect()
    }

    async fn get_observations_near(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> anyhow::Result<Vec<Observation>> {
        // Bounding-box prefilter in SQL, exact haversine post-filter.
        let lat_delta = radius_m / METERS_PER_DEGREE;
        let lng_scale = center.lat.to_radians().cos().abs().max(0.01);
        let lng_delta = radius_m / (METERS_PER_DEGREE * lng_scale);

        let mut conn = self.state.conn().await?;
        let candidates: Vec<Observation> = sqlx::query(
            r#"SELECT id, route_id, lat, lng, kind, note, weight, created_at
            FROM observation
            WHERE lat BETWEEN $1 AND $2 AND lng BETWEEN $3 AND $4
            ORDER BY id ASC"#,
        )
        .bind(center.lat - lat_delta)
        .bind(center.lat + lat_delta)
        .bind(center.lng - lng_delta)
        .bind(center.lng + lng_delta)
        .fetch_all(&mut **conn)
        .await?
        .iter()
        .map(observation_from_row)
        .collect::<anyhow::Result<_>>()?;

        Ok(candidates
            .into_iter()
            .filter(|o| haversine_m(center, o.position) <= radius_m)
            .collect())
    }

    async fn delete_observation(&self, observation: Observation) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        sqlx::query("DELETE FROM observation WHERE id = $1")
            .bind(observation.id)
            .execute(&mut **conn)
            .await?;
        Ok(())
    }
}
