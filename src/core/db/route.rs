use crate::core::db::{detection::DetectionRepository, point::SamplePointRepository};
use crate::models::GeoPoint;

#[derive(Debug, Clone)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub profile: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub distance_m: f64,
    pub duration_s: f64,
    pub light_score: Option<f64>,
    pub coverage: Option<f64>,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewRoute {
    pub name: String,
    pub profile: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Provider-order (lng, lat) pairs.
    pub geometry: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteUpdate {
    pub name: Option<String>,
    pub light_score: Option<Option<f64>>,
    pub coverage: Option<Option<f64>>,
}

pub trait BoundRouteRepository: SamplePointRepository + DetectionRepository {
    fn get_route(&self) -> impl Future<Output = anyhow::Result<Route>>;
    fn update_route(&self, update: &RouteUpdate) -> impl Future<Output = anyhow::Result<Route>>;
    /// The stored route geometry in provider (lng, lat) order.
    fn geometry(&self) -> &[(f64, f64)];
    fn delete(self) -> impl Future<Output = anyhow::Result<()>>;
}

pub trait RouteRepository: 'static {
    type Repository: BoundRouteRepository
    where
        Self: 'static;
    fn get_route_repo(
        &self,
        id: i64,
    ) -> impl Future<Output = anyhow::Result<Self::Repository>> + 'static;
    fn add_route(
        &self,
        route: NewRoute,
    ) -> impl Future<Output = anyhow::Result<Self::Repository>>;
    fn get_routes(&self) -> impl Future<Output = anyhow::Result<Vec<Route>>>;
}
