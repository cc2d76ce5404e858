//! REST client for the match persistence service

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::game::{MatchId, UserId};

use super::games::{ConnectionState, LifecycleReporter, MatchDirectory, MatchInfo, MatchResult};
use super::StoreError;

/// Client for the game service that owns match records
#[derive(Clone)]
pub struct GameServiceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct FinishGame {
    points_player_a: u32,
    points_player_b: u32,
    winner_player_id: Option<UserId>,
}

#[derive(Serialize)]
struct UpdateState {
    state: String,
}

impl GameServiceClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.game_service_url, config.game_service_token.clone())
    }

    pub fn with_base_url(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON document; 404 maps to `StoreError::NotFound`
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        response.json().await.map_err(StoreError::Parse)
    }

    /// Send a request whose response body is ignored
    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), StoreError> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }

    pub async fn fetch_ongoing_match(&self, user_id: UserId) -> Result<MatchInfo, StoreError> {
        self.get_json(&format!("games/ongoing?user_id={}", user_id)).await
    }

    pub async fn fetch_match(&self, match_id: MatchId) -> Result<MatchInfo, StoreError> {
        self.get_json(&format!("games/{}", match_id)).await
    }

    pub async fn start_game(&self, match_id: MatchId) -> Result<(), StoreError> {
        self.send::<()>(Method::POST, &format!("games/{}/start", match_id), None)
            .await
    }

    pub async fn finish_game(&self, result: &MatchResult) -> Result<(), StoreError> {
        let body = FinishGame {
            points_player_a: result.score_a,
            points_player_b: result.score_b,
            winner_player_id: result.winner_user_id,
        };
        self.send(Method::POST, &format!("games/{}/finish", result.match_id), Some(&body))
            .await
    }

    pub async fn update_state(&self, match_id: MatchId, state: String) -> Result<(), StoreError> {
        self.send(Method::PATCH, &format!("games/{}/state", match_id), Some(&UpdateState { state }))
            .await
    }

    /// Run a report in the background; failures are logged, never retried
    fn spawn_report<F>(&self, match_id: MatchId, report: &'static str, fut: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(match_id, report, "No runtime available, lifecycle report dropped");
            return;
        };

        handle.spawn(async move {
            match fut.await {
                Ok(()) => debug!(match_id, report, "Lifecycle report delivered"),
                Err(e) => warn!(match_id, report, error = %e, "Lifecycle report failed"),
            }
        });
    }
}

impl MatchDirectory for GameServiceClient {
    fn find_ongoing_match(&self, user_id: UserId) -> BoxFuture<'_, Result<MatchInfo, StoreError>> {
        self.fetch_ongoing_match(user_id).boxed()
    }

    fn find_match_by_id(&self, match_id: MatchId) -> BoxFuture<'_, Result<MatchInfo, StoreError>> {
        self.fetch_match(match_id).boxed()
    }
}

impl LifecycleReporter for GameServiceClient {
    fn match_started(&self, match_id: MatchId) {
        let client = self.clone();
        self.spawn_report(match_id, "match_started", async move {
            client.start_game(match_id).await
        });
    }

    fn match_finished(&self, result: &MatchResult) {
        let client = self.clone();
        let result = result.clone();
        self.spawn_report(result.match_id, "match_finished", async move {
            client.finish_game(&result).await
        });
    }

    fn connection_state(&self, match_id: MatchId, state: ConnectionState) {
        let client = self.clone();
        self.spawn_report(match_id, "connection_state", async move {
            client.update_state(match_id, state.as_state_string()).await
        });
    }
}
