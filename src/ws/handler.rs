//! WebSocket handshake and per-connection reader/writer loops

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::mailbox::{MailboxError, PlayerLink};
use crate::game::state::PlayerSlot;
use crate::game::{Attachment, KeyInput, MatchId, Session, UserId};
use crate::http::middleware::{select_credential, AUTH_COOKIE};
use crate::http::routes::AppError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// JWT, for clients that cannot set headers or cookies
    pub token: Option<String>,
    /// Join this match instead of the caller's ongoing one
    pub match_id: Option<MatchId>,
}

/// A caller that passed the handshake
#[derive(Debug)]
pub struct Admission {
    pub user_id: UserId,
    pub slot: PlayerSlot,
    pub session: Arc<Session>,
}

/// WebSocket upgrade handler. Every rejection happens before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let credential = select_credential(
        bearer.as_ref().map(|TypedHeader(auth)| auth.token()),
        jar.get(AUTH_COOKIE).map(|cookie| cookie.value()),
        query.token.as_deref(),
    )?;

    let admission = admit(&state, credential, query.match_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, admission, state)))
}

/// Resolve identity, match and session for a connecting player
pub async fn admit(
    state: &AppState,
    credential: &str,
    match_id: Option<MatchId>,
) -> Result<Admission, AppError> {
    let user_id = state.identity.resolve_user_id(credential).map_err(|e| {
        warn!(error = %e, "WebSocket auth failed");
        e
    })?;

    let info = match match_id {
        Some(id) => state.matches.find_match_by_id(id).await?,
        None => state.matches.find_ongoing_match(user_id).await?,
    };

    if info.finished {
        return Err(AppError::NotFound(format!("match {} has finished", info.id)));
    }

    let slot = info.slot_of(user_id).ok_or_else(|| {
        AppError::NotFound(format!("user {} is not playing match {}", user_id, info.id))
    })?;

    let session = state.sessions.get_or_create(&info);
    if session.is_finished() {
        return Err(AppError::Conflict(format!("match {} has finished", info.id)));
    }

    info!(user_id, match_id = info.id, slot = %slot, "Player admitted");
    Ok(Admission {
        user_id,
        slot,
        session,
    })
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(mut socket: WebSocket, admission: Admission, state: AppState) {
    let Admission {
        user_id,
        slot,
        session,
    } = admission;
    let conn_id = Uuid::new_v4();
    let match_id = session.id();

    let Attachment { link, outbound } = match session.attach(slot) {
        Ok(attachment) => attachment,
        Err(e) => {
            warn!(%conn_id, user_id, match_id, error = %e, "Session closed before attach");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    if let Err(e) = link.connect() {
        warn!(%conn_id, user_id, match_id, error = %e, "Failed to queue connect");
    }
    info!(%conn_id, user_id, match_id, slot = %slot, "WebSocket connection opened");

    let (ws_sink, ws_stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(ws_sink, outbound, conn_id));

    tokio::select! {
        _ = read_loop(ws_stream, &link, conn_id) => {}
        _ = &mut writer => {
            debug!(%conn_id, "Writer finished, closing reader");
        }
    }

    // Replaced or finished links get Closed here; nothing to do about it
    let _ = link.disconnect();
    writer.abort();

    info!(
        %conn_id,
        user_id,
        match_id,
        active_sessions = state.sessions.active_sessions(),
        "WebSocket connection closed"
    );
}

/// Forward session output to the socket until the session lets go
async fn write_loop(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerMsg>,
    conn_id: Uuid,
) {
    while let Some(msg) = outbound.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(%conn_id, error = %e, "WebSocket send failed");
            return;
        }
    }

    debug!(%conn_id, "Outbound queue closed");
    let _ = ws_sink.send(Message::Close(None)).await;
}

/// Feed client messages into the player's mailbox
async fn read_loop(mut ws_stream: SplitStream<WebSocket>, link: &PlayerLink, conn_id: Uuid) {
    let rate_limiter = PlayerRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(%conn_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::KeyState { key, state }) => {
                        let input = KeyInput {
                            key,
                            pressed: state,
                        };
                        if link.push_input(input) == Err(MailboxError::Closed) {
                            debug!(%conn_id, "Mailbox closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(%conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(%conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(%conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
