use crate::models::GeoPoint;
use time::OffsetDateTime;

/// What a pedestrian reported about a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    /// A lamp exists but is dark or broken.
    LampOut,
    /// The spot is darker than the survey suggests.
    DarkSpot,
    /// The spot is better lit than the survey suggests.
    WellLit,
    /// A lamp the survey missed.
    NewLamp,
}

impl ObservationKind {
    /// Whether this observation raises the local illumination estimate.
    pub fn is_positive(&self) -> bool {
        matches!(self, ObservationKind::WellLit | ObservationKind::NewLamp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::LampOut => "lamp-out",
            ObservationKind::DarkSpot => "dark-spot",
            ObservationKind::WellLit => "well-lit",
            ObservationKind::NewLamp => "new-lamp",
        }
    }
}

impl TryFrom<i64> for ObservationKind {
    type Error = anyhow::Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ObservationKind::LampOut),
            1 => Ok(ObservationKind::DarkSpot),
            2 => Ok(ObservationKind::WellLit),
            3 => Ok(ObservationKind::NewLamp),
            _ => Err(anyhow::anyhow!("Invalid ObservationKind value: {}", value)),
        }
    }
}

impl From<ObservationKind> for i64 {
    fn from(kind: ObservationKind) -> Self {
        match kind {
            ObservationKind::LampOut => 0,
            ObservationKind::DarkSpot => 1,
            ObservationKind::WellLit => 2,
            ObservationKind::NewLamp => 3,
        }
    }
}

impl std::str::FromStr for ObservationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lamp-out" => Ok(ObservationKind::LampOut),
            "dark-spot" => Ok(ObservationKind::DarkSpot),
            "well-lit" => Ok(ObservationKind::WellLit),
            "new-lamp" => Ok(ObservationKind::NewLamp),
            other => Err(format!(
                "unknown observation kind '{}' (expected lamp-out, dark-spot, well-lit or new-lamp)",
                other
            )),
        }
    }
}

/// A stored user observation.
#[derive(Debug, Clone)]
pub struct Observation {
    pub id: i64,
    /// Route the reporter was walking, if known. Survives route deletion as None.
    pub route_id: Option<i64>,
    pub position: GeoPoint,
    pub kind: ObservationKind,
    pub note: Option<String>,
    /// Reporter trust weight in [0, 1].
    pub weight: f64,
    pub created_at: OffsetDateTime,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewObservation {
    pub route_id: Option<i64>,
    pub position: GeoPoint,
    pub kind: ObservationKind,
    pub note: Option<String>,
    pub weight: f64,
}

pub trait ObservationRepository {
    fn add_observation(
        &self,
        observation: &NewObservation,
    ) -> impl Future<Output = anyhow::Result<Observation>>;
    fn get_observations(&self) -> impl Future<Output = anyhow::Result<Vec<Observation>>>;
    /// Observations within `radius_m` of `center`.
    fn get_observations_near(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> impl Future<Output = anyhow::Result<Vec<Observation>>>;
    fn delete_observation(
        &self,
        observation: Observation,
    ) -> impl Future<Output = anyhow::Result<()>>;
}
