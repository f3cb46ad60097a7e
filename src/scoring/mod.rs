use crate::core::db::ObservationKind;
use crate::models::GeoPoint;
use crate::routing::geometry::haversine_m;
use anyhow::Result;

/// Rate of the saturating-exponential illumination curve: each additional
/// detected lamp contributes less than the previous one.
pub const SATURATION_RATE: f64 = 0.8;

/// Observations further than this from a sample point do not affect it.
pub const FEEDBACK_RADIUS_M: f64 = 25.0;

pub const POSITIVE_ADJUST: f64 = 0.15;
pub const NEGATIVE_ADJUST: f64 = 0.20;

/// Nominal pedestrian-street lamp spacing. Segments longer than this are
/// penalized: one lit endpoint cannot vouch for a long dark stretch.
pub const NOMINAL_LAMP_SPACING_M: f64 = 40.0;

/// Qualitative bands for a 0-100 route light score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    WellLit,
    Moderate,
    Poor,
    Unlit,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ScoreBand::WellLit
        } else if score >= 45.0 {
            ScoreBand::Moderate
        } else if score >= 20.0 {
            ScoreBand::Poor
        } else {
            ScoreBand::Unlit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::WellLit => "well-lit",
            ScoreBand::Moderate => "moderate",
            ScoreBand::Poor => "poor",
            ScoreBand::Unlit => "unlit",
        }
    }
}

/// Scoring view of a survey point.
#[derive(Debug, Clone)]
pub struct PointSample {
    pub position: GeoPoint,
    /// None when no imagery could be fetched for the point.
    pub illumination: Option<f64>,
}

/// Scoring view of a user observation.
#[derive(Debug, Clone)]
pub struct FeedbackPoint {
    pub position: GeoPoint,
    pub kind: ObservationKind,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct SegmentScore {
    pub start_seq: usize,
    pub end_seq: usize,
    pub length_m: f64,
    /// Segment illumination in [0, 1].
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct RouteScore {
    /// 0-100, one decimal.
    pub route_score: f64,
    pub band: ScoreBand,
    /// Fraction of sample points with imagery.
    pub coverage: f64,
    pub segments: Vec<SegmentScore>,
    /// Index into `segments` of the darkest segment.
    pub darkest: Option<usize>,
}

/// Illumination of a single sample point from its detection confidences.
pub fn point_illumination(confidences: &[f32]) -> f64 {
    let total: f64 = confidences.iter().map(|&c| c as f64).sum();
    1.0 - (-SATURATION_RATE * total).exp()
}

/// Apply nearby feedback to a point's base illumination.
///
/// Points without imagery count as dark but can still be raised by
/// positive observations.
pub fn adjusted_illumination(sample: &PointSample, feedback: &[FeedbackPoint]) -> f64 {
    let mut value = sample.illumination.unwrap_or(0.0);
    for fb in feedback {
        if haversine_m(sample.position, fb.position) > FEEDBACK_RADIUS_M {
            continue;
        }
        if fb.kind.is_positive() {
            value += POSITIVE_ADJUST * fb.weight;
        } else {
            value -= NEGATIVE_ADJUST * fb.weight;
        }
    }
    value.clamp(0.0, 1.0)
}

/// Aggregate per-point illuminations into segment scores and a route score.
pub fn score_route(points: &[PointSample], feedback: &[FeedbackPoint]) -> Result<RouteScore> {
    if points.len() < 2 {
        anyhow::bail!("scoring requires at least 2 sample points, got {}", points.len());
    }

    let adjusted: Vec<f64> = points
        .iter()
        .map(|p| adjusted_illumination(p, feedback))
        .collect();

    let mut segments = Vec::with_capacity(points.len() - 1);
    let mut total_length = 0.0;
    for i in 0..points.len() - 1 {
        let length_m = haversine_m(points[i].position, points[i + 1].position);
        total_length += length_m;

        let base = (adjusted[i] + adjusted[i + 1]) / 2.0;
        let gap_factor = if length_m > NOMINAL_LAMP_SPACING_M {
            NOMINAL_LAMP_SPACING_M / length_m
        } else {
            1.0
        };
        segments.push(SegmentScore {
            start_seq: i,
            end_seq: i + 1,
            length_m,
            score: base * gap_factor,
        });
    }

    if total_length <= 0.0 {
        anyhow::bail!("route has zero length, cannot score");
    }

    let weighted: f64 = segments
        .iter()
        .map(|s| s.score * s.length_m)
        .sum::<f64>()
        / total_length;
    let route_score = (weighted * 100.0 * 10.0).round() / 10.0;

    let covered = points.iter().filter(|p| p.illumination.is_some()).count();
    let coverage = covered as f64 / points.len() as f64;

    let darkest = segments
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i);

    Ok(RouteScore {
        route_score,
        band: ScoreBand::from_score(route_score),
        coverage,
        segments,
        darkest,
    })
}
