use crate::config::AppConfig;
use crate::shared::metrics::MetricsCollector;
use crate::shared::utils::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub metrics: MetricsCollector,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &"[REDACTED]")
            .field("metrics", &"MetricsCollector")
            .finish()
    }
}
