use crate::models::LampDetection;

/// A lamp detection persisted against a survey point.
#[derive(Debug, Clone)]
pub struct StoredDetection {
    pub id: i64,
    /// seq of the sample point this detection belongs to.
    pub point_seq: i64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub brightness: f64,
    pub confidence: f64,
    /// True when a remote confirmation accepted the detection.
    pub verified: bool,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewDetection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub brightness: f64,
    pub confidence: f64,
    pub verified: bool,
}

impl NewDetection {
    pub fn from_lamp(detection: &LampDetection, verified: bool) -> Self {
        Self {
            x: detection.x,
            y: detection.y,
            width: detection.width,
            height: detection.height,
            brightness: detection.brightness as f64,
            confidence: detection.confidence as f64,
            verified,
        }
    }
}

pub trait DetectionRepository {
    fn add_detections(
        &self,
        seq: i64,
        detections: &[NewDetection],
    ) -> impl Future<Output = anyhow::Result<()>>;
    /// All detections for the route, ordered by point seq.
    fn get_detections(&self) -> impl Future<Output = anyhow::Result<Vec<StoredDetection>>>;
    fn clear_detections(&self, seq: i64) -> impl Future<Output = anyhow::Result<()>>;
}
