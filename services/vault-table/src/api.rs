//! HTTP and WebSocket transport.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State as AxumState};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use timevault_types::api::{InboundMessage, Notification, OutboundResponse};
use timevault_types::constants::LEADERBOARD_BROADCAST_SIZE;
use timevault_types::validate_bet_input;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::session::{Session, SessionError};

pub struct Api {
    session: Arc<Session>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match self {
            SessionError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl Api {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods([Method::GET, Method::OPTIONS]);

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/healthz", get(healthz))
            .route("/leaderboard", get(leaderboard))
            .route("/game/history", get(history))
            .route("/player/:player_id/stats", get(player_stats))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.session))
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn leaderboard(AxumState(session): AxumState<Arc<Session>>) -> impl IntoResponse {
    Json(session.leaderboard_top(LEADERBOARD_BROADCAST_SIZE).await)
}

async fn history(AxumState(session): AxumState<Arc<Session>>) -> impl IntoResponse {
    Json(session.round_history().await)
}

async fn player_stats(
    AxumState(session): AxumState<Arc<Session>>,
    Path(player_id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    Ok(Json(session.player_stats(&player_id).await?))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(session): AxumState<Arc<Session>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: Arc<Session>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = session.subscribe();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Greet with the current round and standings.
    if let Some(round) = session.current_round().await {
        if let Ok(payload) = round.snapshot().await {
            send_json(&tx, &Notification::GameUpdate { payload });
        }
    }
    send_json(
        &tx,
        &Notification::LeaderboardUpdate {
            entries: session.leaderboard_top(LEADERBOARD_BROADCAST_SIZE).await,
        },
    );

    let broadcast_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(notification) = broadcast_rx.recv().await {
                send_json(&tx, &notification);
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(inbound) => {
                    let response = handle_inbound(inbound, &session).await;
                    send_json(&tx, &response);
                }
                Err(err) => {
                    warn!(?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    write_task.abort();
    broadcast_task.abort();
}

pub(crate) async fn handle_inbound(
    inbound: InboundMessage,
    session: &Arc<Session>,
) -> OutboundResponse {
    match inbound {
        InboundMessage::PlaceBet {
            request_id,
            player_id,
            second,
            amount,
            power_up,
        } => {
            let bet = match validate_bet_input(&player_id, &second, amount, power_up.as_deref()) {
                Ok(bet) => bet,
                Err(err) => return error_response(request_id, "INVALID_BET", err.to_string()),
            };
            let Some(round) = session.current_round().await else {
                return error_response(
                    request_id,
                    "BETTING_CLOSED",
                    "no round in progress".to_string(),
                );
            };
            if !round
                .place_bet(bet.player_id, bet.second, bet.amount, bet.power_up)
                .await
            {
                return error_response(
                    request_id,
                    "BETTING_CLOSED",
                    "betting is closed".to_string(),
                );
            }
            debug!(round_id = %round.id(), %player_id, "bet accepted");
            OutboundResponse::Ack {
                request_id,
                stats: session.player_stats(&player_id).await.ok(),
            }
        }
        InboundMessage::Stats {
            request_id,
            player_id,
        } => match session.player_stats(&player_id).await {
            Ok(stats) => OutboundResponse::Ack {
                request_id,
                stats: Some(stats),
            },
            Err(err) => error_response(request_id, "PLAYER_NOT_FOUND", err.to_string()),
        },
    }
}

fn error_response(request_id: String, code: &str, message: String) -> OutboundResponse {
    OutboundResponse::Error {
        request_id,
        code: code.to_string(),
        message,
    }
}

fn send_json<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, payload: &T) {
    if let Ok(payload) = serde_json::to_string(payload) {
        let _ = tx.send(Message::Text(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use timevault_types::{PlayerStats, RoundConfig};
    use tower::ServiceExt;

    fn fixed_config() -> RoundConfig {
        RoundConfig {
            min_seconds: 50,
            max_seconds: 50,
            quick_burst_chance: 0.0,
            bonus_vault_chance: 0.0,
            ..RoundConfig::default()
        }
    }

    fn place_bet(request_id: &str, second: Value, amount: Value) -> Value {
        json!({
            "type": "place_bet",
            "requestId": request_id,
            "playerId": "p",
            "second": second,
            "amount": amount,
        })
    }

    fn inbound(raw: Value) -> InboundMessage {
        serde_json::from_value(raw).unwrap()
    }

    fn error_code(response: OutboundResponse) -> String {
        match response {
            OutboundResponse::Error { code, .. } => code,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_place_bet_without_round_is_closed() {
        let session = Session::new(Some(1));
        let raw = place_bet("r1", json!(50), json!(10));
        match handle_inbound(inbound(raw), &session).await {
            OutboundResponse::Error {
                request_id, code, ..
            } => {
                assert_eq!(request_id, "r1");
                assert_eq!(code, "BETTING_CLOSED");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_at_boundary() {
        let session = Session::new(Some(1));
        session
            .create_and_start_round(&fixed_config(), &[])
            .await
            .unwrap();

        let mut unknown_power_up = place_bet("r", json!(5), json!(10));
        unknown_power_up["powerUp"] = json!("teleport");
        for raw in [
            place_bet("r", json!(-1), json!(10)),
            place_bet("r", json!(1.5), json!(10)),
            place_bet("r", json!(5), json!(0)),
            unknown_power_up,
        ] {
            let code = error_code(handle_inbound(inbound(raw.clone()), &session).await);
            assert_eq!(code, "INVALID_BET", "{raw}");
        }
        assert!(session.player_stats("p").await.is_err());
    }

    #[tokio::test]
    async fn test_accepted_bet_acks_with_stats() {
        let session = Session::new(Some(1));
        session
            .create_and_start_round(&fixed_config(), &[])
            .await
            .unwrap();

        let mut raw = place_bet("r2", json!(50), json!(12.5));
        raw["powerUp"] = json!("multiplier_boost");
        match handle_inbound(inbound(raw), &session).await {
            OutboundResponse::Ack { request_id, stats } => {
                assert_eq!(request_id, "r2");
                assert_eq!(stats.map(|s| s.total_bet), Some(12.5));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bet_after_close_is_rejected() {
        let session = Session::new(Some(1));
        let round = session
            .create_and_start_round(&fixed_config(), &[])
            .await
            .unwrap();
        round.end_round().await.unwrap();

        let raw = place_bet("r3", json!(50), json!(1));
        let code = error_code(handle_inbound(inbound(raw), &session).await);
        assert_eq!(code, "BETTING_CLOSED");
    }

    #[tokio::test]
    async fn test_http_read_endpoints() {
        let session = Session::new(Some(3));
        let round = session
            .create_and_start_round(&fixed_config(), &[])
            .await
            .unwrap();
        round.place_bet("alice", 50, 100.0, None).await;
        round.place_bet("bob", 12, 10.0, None).await;
        round.end_round().await.unwrap();
        let router = Api::new(Arc::clone(&session)).router();

        let (status, body) = get_json(router.clone(), "/leaderboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["playerId"], "alice");

        let (status, body) = get_json(router.clone(), "/game/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["round_id"], round.id().as_str());

        let (status, body) = get_json(router.clone(), "/player/bob/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats: PlayerStats = serde_json::from_value(body).unwrap();
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.total_bet, 10.0);

        let (status, body) = get_json(router, "/player/nobody/stats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "player not found: nobody");
    }
}
