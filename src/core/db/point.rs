use crate::models::GeoPoint;
use image::DynamicImage;

/// A survey point along a route: position, walking heading, and the
/// analysis results attached to it.
#[derive(Debug, Clone)]
pub struct SamplePoint {
    pub id: i64,
    pub route_id: i64,
    /// 0-based position along the route.
    pub seq: i64,
    pub position: GeoPoint,
    /// Compass bearing toward the next point, 1..=360. None on the last point.
    pub heading: Option<u16>,
    pub image_fname: Option<String>,
    /// Point illumination in [0, 1]. None until the point has been analyzed.
    pub illumination: Option<f64>,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewSamplePoint {
    pub seq: i64,
    pub position: GeoPoint,
    pub heading: Option<u16>,
}

pub trait SamplePointRepository {
    /// Insert all points in one transaction.
    fn add_points(&self, points: &[NewSamplePoint]) -> impl Future<Output = anyhow::Result<()>>;
    fn get_points(&self) -> impl Future<Output = anyhow::Result<Vec<SamplePoint>>>;
    /// Store the fetched image bytes for a point, returning the archive filename.
    fn set_point_image(
        &self,
        seq: i64,
        bytes: &[u8],
        extension: &str,
    ) -> impl Future<Output = anyhow::Result<String>>;
    fn load_point_image(
        &self,
        seq: i64,
    ) -> impl Future<Output = anyhow::Result<Option<DynamicImage>>>;
    fn set_point_illumination(
        &self,
        seq: i64,
        illumination: f64,
    ) -> impl Future<Output = anyhow::Result<()>>;
}
