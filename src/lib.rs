pub mod core;
pub mod detection;
pub mod export;
pub mod imagery;
pub mod models;
pub mod pipeline;
pub mod routing;
pub mod scoring;
pub mod survey;

pub use detection::LuminaireDetector;
pub use models::{GeoPoint, LampDetection, LuminaireBlob};
pub use pipeline::{
    DebugConfig, MetaValue, Pipeline, PipelineStage, Region, StageContext, StageData,
};
pub use survey::{SurveyOptions, SurveyReport, SurveyRequest, Surveyor};
