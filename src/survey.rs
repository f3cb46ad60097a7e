use crate::core::db::{
    BoundRouteRepository, DetectionRepository, NewDetection, NewRoute, NewSamplePoint,
    Observation, ObservationRepository, RouteRepository, RouteUpdate, SamplePoint,
    SamplePointRepository, SurveyDb,
};
use crate::detection::{LuminaireDetector, confirm::ConfirmClient};
use crate::imagery::{FetchedImage, ImageSize, StreetViewClient};
use crate::models::{GeoPoint, LampDetection};
use crate::routing::{OrsClient, RoutePath};
use crate::scoring::{self, FeedbackPoint, PointSample, RouteScore};
use anyhow::Result;
use image::DynamicImage;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SurveyOptions {
    /// Number of evenly spaced survey points along the route.
    pub samples: usize,
    pub image_size: ImageSize,
    /// Camera pitch in degrees; slightly upward catches lamp heads.
    pub pitch: Option<i32>,
    /// Detections below this confidence are sent to the confirmation
    /// endpoint when one is configured.
    pub confirm_below: f32,
}

impl Default for SurveyOptions {
    fn default() -> Self {
        Self {
            samples: 100,
            image_size: ImageSize::default(),
            pitch: None,
            confirm_below: 0.55,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurveyRequest {
    pub name: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub profile: String,
}

#[derive(Debug)]
pub struct SurveyReport {
    pub route_id: i64,
    pub score: RouteScore,
    pub points_surveyed: usize,
    pub points_failed: usize,
    pub detections_total: usize,
}

/// Orchestrates a full survey: resolve the route, fetch imagery along it,
/// detect luminaires, score, and persist everything into the survey file.
pub struct Surveyor {
    routing: OrsClient,
    imagery: StreetViewClient,
    detector: LuminaireDetector,
    confirm: Option<ConfirmClient>,
    options: SurveyOptions,
}

impl Surveyor {
    pub fn new(routing: OrsClient, imagery: StreetViewClient) -> Self {
        Self {
            routing,
            imagery,
            detector: LuminaireDetector::default(),
            confirm: None,
            options: SurveyOptions::default(),
        }
    }

    pub fn with_detector(mut self, detector: LuminaireDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_confirm(mut self, confirm: ConfirmClient) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn with_options(mut self, options: SurveyOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self, db: &SurveyDb, request: SurveyRequest) -> Result<SurveyReport> {
        info!(name = %request.name, profile = %request.profile, "resolving route");
        let resolved = self
            .routing
            .directions(request.start, request.end, &request.profile)
            .await?;

        let path = RoutePath::from_lnglat(&resolved.geometry)?;
        let samples = path.sample_with_headings(self.options.samples)?;

        let route_repo = db
            .add_route(NewRoute {
                name: request.name,
                profile: request.profile,
                start: request.start,
                end: request.end,
                distance_m: resolved.distance_m,
                duration_s: resolved.duration_s,
                geometry: resolved.geometry,
            })
            .await?;

        let new_points: Vec<NewSamplePoint> = samples
            .iter()
            .enumerate()
            .map(|(i, (position, heading))| NewSamplePoint {
                seq: i as i64,
                position: *position,
                heading: *heading,
            })
            .collect();
        route_repo.add_points(&new_points).await?;

        let mut points_surveyed = 0;
        let mut points_failed = 0;
        let mut detections_total = 0;

        for (i, (position, heading)) in samples.iter().enumerate() {
            let seq = i as i64;
            let fetched = match self
                .imagery
                .fetch(*position, *heading, self.options.pitch, self.options.image_size)
                .await
            {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(seq, error = %e, "imagery fetch failed, skipping point");
                    points_failed += 1;
                    continue;
                }
            };

            let stored = self
                .analyze_point(&route_repo, seq, *position, &fetched)
                .await?;
            detections_total += stored;
            points_surveyed += 1;
        }

        info!(
            points_surveyed,
            points_failed, detections_total, "survey sweep complete, scoring"
        );

        let points = route_repo.get_points().await?;
        let observations = db.get_observations().await?;
        let score = score_stored(&points, &observations)?;

        route_repo
            .update_route(&RouteUpdate {
                light_score: Some(Some(score.route_score)),
                coverage: Some(Some(score.coverage)),
                ..Default::default()
            })
            .await?;

        let route = route_repo.get_route().await?;
        Ok(SurveyReport {
            route_id: route.id,
            score,
            points_surveyed,
            points_failed,
            detections_total,
        })
    }

    /// Store imagery and detections for one survey point. Returns the number
    /// of detections kept.
    async fn analyze_point(
        &self,
        route_repo: &impl BoundRouteRepository,
        seq: i64,
        position: GeoPoint,
        fetched: &FetchedImage,
    ) -> Result<usize> {
        route_repo
            .set_point_image(seq, &fetched.bytes, fetched.format)
            .await?;

        let detections = self.detector.detect(&fetched.image)?;
        let stored = self
            .confirm_detections(position, &fetched.image, detections)
            .await;

        let confidences: Vec<f32> = stored.iter().map(|(d, _)| d.confidence).collect();
        let illumination = scoring::point_illumination(&confidences);

        let new_detections: Vec<NewDetection> = stored
            .iter()
            .map(|(d, verified)| NewDetection::from_lamp(d, *verified))
            .collect();
        route_repo.add_detections(seq, &new_detections).await?;
        route_repo.set_point_illumination(seq, illumination).await?;

        Ok(new_detections.len())
    }

    async fn confirm_detections(
        &self,
        position: GeoPoint,
        frame: &DynamicImage,
        detections: Vec<LampDetection>,
    ) -> Vec<(LampDetection, bool)> {
        match &self.confirm {
            Some(client) => {
                match client
                    .confirm(position, frame, detections.clone(), self.options.confirm_below)
                    .await
                {
                    Ok(confirmed) => confirmed,
                    Err(e) => {
                        warn!(error = %e, "confirmation endpoint failed, keeping unconfirmed detections");
                        detections.into_iter().map(|d| (d, false)).collect()
                    }
                }
            }
            None => detections.into_iter().map(|d| (d, false)).collect(),
        }
    }
}

/// Score a route from its stored sample points and the survey's observations.
pub fn score_stored(points: &[SamplePoint], observations: &[Observation]) -> Result<RouteScore> {
    let samples: Vec<PointSample> = points
        .iter()
        .map(|p| PointSample {
            position: p.position,
            illumination: p.illumination,
        })
        .collect();
    let feedback: Vec<FeedbackPoint> = observations
        .iter()
        .map(|o| FeedbackPoint {
            position: o.position,
            kind: o.kind,
            weight: o.weight,
        })
        .collect();
    scoring::score_route(&samples, &feedback)
}
