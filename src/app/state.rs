//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{SessionConfig, SessionRegistry};
use crate::http::middleware::{IdentityResolver, JwtIdentity};
use crate::store::{GameServiceClient, LifecycleReporter, MatchDirectory};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityResolver>,
    pub matches: Arc<dyn MatchDirectory>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let identity = Arc::new(JwtIdentity::new(config.jwt_secret.clone()));

        // One client serves both match lookup and lifecycle reports
        let game_service = Arc::new(GameServiceClient::new(&config));

        Self::with_parts(config, identity, game_service.clone(), game_service)
    }

    pub fn with_parts(
        config: Config,
        identity: Arc<dyn IdentityResolver>,
        matches: Arc<dyn MatchDirectory>,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            SessionConfig::from_config(&config),
            reporter,
        ));

        Self {
            config: Arc::new(config),
            identity,
            matches,
            sessions,
        }
    }
}
