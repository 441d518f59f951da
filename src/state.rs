use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use crate::auth::{JwtKeys, PasswordHasher};
use crate::config::{AppConfig, StoreBackend};
use crate::metrics::MetricsState;
use crate::projects::repo_types::Project;
use crate::store::{
    memory::{AlwaysUp, MemoryCollection},
    postgres::PgStore,
    Collection, Pinger,
};
use crate::users::repo_types::User;

/// Everything a handler may touch. Cheap to clone; nothing in here is
/// mutated by request handling except through the store handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn Collection<User>>,
    pub projects: Arc<dyn Collection<Project>>,
    pub database: Arc<dyn Pinger>,
    pub jwt: JwtKeys,
    pub hasher: PasswordHasher,
    pub metrics: MetricsState,
}

impl AppState {
    pub async fn init(config: AppConfig, metrics: MetricsState) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        match config.database.backend {
            StoreBackend::Postgres => {
                let store = Arc::new(PgStore::connect(&config.database).await?);
                info!("connected to postgres");
                Self::from_parts(config, store.clone(), store.clone(), store, metrics)
            }
            StoreBackend::Memory => {
                info!("using in-memory store; data is lost on exit");
                Self::from_parts(
                    config,
                    MemoryCollection::<User>::new_shared(),
                    MemoryCollection::<Project>::new_shared(),
                    Arc::new(AlwaysUp),
                    metrics,
                )
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn Collection<User>>,
        projects: Arc<dyn Collection<Project>>,
        database: Arc<dyn Pinger>,
        metrics: MetricsState,
    ) -> anyhow::Result<Self> {
        let jwt = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(config.hash_cost)?;
        Ok(Self {
            config,
            users,
            projects,
            database,
            jwt,
            hasher,
            metrics,
        })
    }

    /// State over empty in-memory collections with a cheap hash cost.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(
            MemoryCollection::<Project>::new_shared(),
            Arc::new(AlwaysUp),
        )
    }

    #[cfg(test)]
    pub fn fake_with(projects: Arc<dyn Collection<Project>>, database: Arc<dyn Pinger>) -> Self {
        let mut config = AppConfig::from_lookup(|_| None).expect("default config");
        config.jwt.secret = "test".into();
        config.hash_cost = crate::config::HashCost {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        };
        Self::from_parts(
            Arc::new(config),
            MemoryCollection::<User>::new_shared(),
            projects,
            database,
            MetricsState::detached(),
        )
        .expect("fake state")
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
