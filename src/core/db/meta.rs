use crate::core::db::RouteRepository;
use time::OffsetDateTime;

pub struct UpdateSurveySettings {
    pub name: Option<String>,
    pub default_samples: Option<u64>,
    pub created_at: Option<OffsetDateTime>,
}

pub trait SurveyRepository: RouteRepository {
    fn get_survey_name(&self) -> impl Future<Output = anyhow::Result<String>>;
    fn get_survey_created_at(&self) -> impl Future<Output = anyhow::Result<OffsetDateTime>>;
    fn get_default_samples(&self) -> impl Future<Output = anyhow::Result<u64>>;
    fn set_survey_settings(
        &self,
        settings: UpdateSurveySettings,
    ) -> impl Future<Output = anyhow::Result<()>>;
}
