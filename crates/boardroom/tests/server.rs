//! Integration tests for the Boardroom server, handler, and full
//! connection flow.

use std::time::Duration;

use boardroom::prelude::*;
use boardroom_protocol::{
    ClientMessage, Envelope, EventKind, Rejection, ServerMessage, PROTOCOL_VERSION,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Mock game: take one or two stones from a shared pile in turn.
// =========================================================================

struct Pile;

#[derive(Deserialize)]
#[serde(default)]
struct PileConfig {
    size: u32,
}

impl Default for PileConfig {
    fn default() -> Self {
        Self { size: 7 }
    }
}

#[derive(Clone, Serialize)]
struct PileState {
    stones: u32,
    order: Vec<ParticipantId>,
    turn: usize,
}

impl RuleEngine for Pile {
    type Config = PileConfig;
    type State = PileState;

    fn meta(&self) -> GameMeta {
        GameMeta::new("pile", "Pile")
            .players(2, 2)
            .seat(SeatSpec::human().named("First"))
            .seat(SeatSpec::human().named("Second"))
    }

    fn init(&self, config: &PileConfig, participants: &[Participant]) -> Result<PileState, RuleError> {
        if config.size == 0 {
            return Err(RuleError::InvalidConfig("size must be positive".into()));
        }
        Ok(PileState {
            stones: config.size,
            order: participants.iter().map(|p| p.id).collect(),
            turn: 0,
        })
    }

    fn current_actor(&self, state: &PileState) -> Option<ParticipantId> {
        if state.stones == 0 {
            return None;
        }
        state.order.get(state.turn).copied()
    }

    fn is_terminal(&self, state: &PileState) -> bool {
        state.stones == 0
    }

    fn validate(&self, state: &PileState, _actor: &Participant, action: &Action) -> Result<(), String> {
        if action.name != "take" {
            return Err(format!("unknown action '{}'", action.name));
        }
        match action.param("n").and_then(Value::as_u64) {
            Some(n @ (1 | 2)) if n as u32 <= state.stones => Ok(()),
            _ => Err("n must be 1 or 2 and no more than the pile".into()),
        }
    }

    fn apply(&self, state: &PileState, _actor: &Participant, action: &Action) -> Result<PileState, RuleError> {
        let n = action.param("n").and_then(Value::as_u64).unwrap_or(0) as u32;
        let mut next = state.clone();
        next.stones -= n;
        next.turn = (next.turn + 1) % next.order.len();
        Ok(next)
    }

    fn view(&self, state: &PileState, viewer: &Participant) -> ViewFields {
        ViewFields::new()
            .field("stones", state.stones)
            .field("you", viewer.name.clone())
    }

    fn valid_actions(&self, _state: &PileState, _actor: &Participant) -> Vec<ActionSpec> {
        vec![ActionSpec::new("take", "Take stones").with_schema(json!({
            "properties": {"n": {"enum": [1, 2]}}
        }))]
    }
}

fn take(n: u32) -> Action {
    Action::with_params("take", json!({ "n": n }))
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(ServerConfig::default()).await
}

async fn start_server_with(config: ServerConfig) -> String {
    let server = BoardroomServerBuilder::new()
        .config(config)
        .bind("127.0.0.1:0")
        .game(Pile)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, payload: ClientMessage) {
    let envelope = Envelope::new(1, 0, payload);
    let json = serde_json::to_string(&envelope).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn recv(ws: &mut ClientWs) -> Envelope<ServerMessage> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid envelope");
            }
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("valid envelope");
            }
            _ => continue,
        }
    }
}

async fn assert_closed(ws: &mut ClientWs) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("server should close the connection");
        match next {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

/// Connects and completes the hello/welcome exchange.
async fn greeted(addr: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    send(&mut ws, ClientMessage::Hello { version: PROTOCOL_VERSION }).await;
    let welcome = recv(&mut ws).await;
    assert!(matches!(welcome.payload, ServerMessage::Welcome { .. }));
    ws
}

async fn create_pile(ws: &mut ClientWs) -> SessionId {
    send(
        ws,
        ClientMessage::CreateSession {
            game_type: "pile".into(),
            seats: vec![SeatSpec::human(), SeatSpec::human()],
            config: Value::Null,
        },
    )
    .await;
    match recv(ws).await.payload {
        ServerMessage::SessionCreated { session_id } => session_id,
        other => panic!("expected SessionCreated, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_gets_welcome() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientMessage::Hello { version: PROTOCOL_VERSION }).await;
    let welcome = recv(&mut ws).await;

    assert_eq!(welcome.seq, 0);
    assert_eq!(
        welcome.payload,
        ServerMessage::Welcome {
            protocol_version: PROTOCOL_VERSION
        }
    );
}

#[tokio::test]
async fn test_hello_wrong_version_errors_and_closes() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientMessage::Hello { version: 99 }).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("99"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_first_message_must_be_hello() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientMessage::ListGames).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("hello"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_hello_timeout_closes_connection() {
    let config = ServerConfig {
        handshake_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let addr = start_server_with(config).await;
    let mut ws = connect(&addr).await;

    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
    assert_closed(&mut ws).await;
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_heartbeat_ack_echoes_client_time() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;

    send(&mut ws, ClientMessage::Heartbeat { client_time: 4242 }).await;
    let ack = recv(&mut ws).await;

    assert_eq!(ack.seq, 1, "replies are numbered after welcome");
    match ack.payload {
        ServerMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 4242),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_games() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;

    send(&mut ws, ClientMessage::ListGames).await;
    match recv(&mut ws).await.payload {
        ServerMessage::GameList { games } => {
            assert_eq!(games.len(), 1);
            assert_eq!(games[0].game_type, "pile");
        }
        other => panic!("expected GameList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_unknown_game_is_error_400() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;

    send(
        &mut ws,
        ClientMessage::CreateSession {
            game_type: "chess".into(),
            seats: vec![],
            config: Value::Null,
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("chess"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_invalid_config_is_error_400() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;

    send(
        &mut ws,
        ClientMessage::CreateSession {
            game_type: "pile".into(),
            seats: vec![SeatSpec::human(), SeatSpec::human()],
            config: json!({"size": 0}),
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_errors_without_closing() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;

    ws.send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }

    send(&mut ws, ClientMessage::ListGames).await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerMessage::GameList { .. }
    ));
}

#[tokio::test]
async fn test_get_session_includes_requested_view() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;

    send(
        &mut ws,
        ClientMessage::GetSession {
            session_id,
            participant: Some(ParticipantId(1)),
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::SessionState { info, view } => {
            assert_eq!(info.game_type, "pile");
            assert_eq!(info.origin, "127.0.0.1");
            assert_eq!(info.current_actor, Some(ParticipantId(0)));
            let view = view.expect("participant view");
            assert_eq!(view.get("stones"), Some(&json!(7)));
            assert_eq!(view.get("you"), Some(&json!("Second")));
        }
        other => panic!("expected SessionState, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_session_is_rejected_not_found() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let missing = SessionId::new();

    send(&mut ws, ClientMessage::GetHistory { session_id: missing }).await;
    assert_eq!(
        recv(&mut ws).await.payload,
        ServerMessage::Rejected {
            rejection: Rejection::SessionNotFound {
                session_id: missing
            }
        }
    );
}

// =========================================================================
// Turns
// =========================================================================

#[tokio::test]
async fn test_submit_reaches_subscriber() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;

    send(
        &mut ws,
        ClientMessage::Subscribe {
            session_id,
            participant: ParticipantId(1),
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Subscribed { snapshot } => {
            assert_eq!(snapshot.version, 0);
            assert_eq!(snapshot.participant, ParticipantId(1));
        }
        other => panic!("expected Subscribed, got {other:?}"),
    }

    send(
        &mut ws,
        ClientMessage::Submit {
            session_id,
            participant: ParticipantId(0),
            action: take(2),
            expected_version: Some(0),
        },
    )
    .await;

    // The reply and the pushed event race on the outbound queue.
    let mut accepted = None;
    let mut pushed = None;
    for _ in 0..2 {
        match recv(&mut ws).await.payload {
            ServerMessage::Accepted { event } => accepted = Some(event),
            ServerMessage::Event { event } => pushed = Some(event),
            other => panic!("unexpected {other:?}"),
        }
    }
    let accepted = accepted.expect("accepted reply");
    let pushed = pushed.expect("subscriber event");

    assert_eq!(accepted.version, 1);
    assert_eq!(accepted.view.participant, ParticipantId(0));
    assert_eq!(pushed.version, 1);
    assert_eq!(pushed.view.participant, ParticipantId(1));
    assert_eq!(pushed.view.get("stones"), Some(&json!(5)));
    assert!(matches!(
        pushed.kind,
        EventKind::ActionApplied { participant: ParticipantId(0), .. }
    ));
}

#[tokio::test]
async fn test_submit_out_of_turn_is_rejected() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;

    send(
        &mut ws,
        ClientMessage::Submit {
            session_id,
            participant: ParticipantId(1),
            action: take(1),
            expected_version: None,
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Rejected {
            rejection:
                Rejection::TurnMismatch {
                    participant,
                    current_actor,
                    ..
                },
        } => {
            assert_eq!(participant, ParticipantId(1));
            assert_eq!(current_actor, Some(ParticipantId(0)));
        }
        other => panic!("expected TurnMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_actions_and_history() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;

    send(
        &mut ws,
        ClientMessage::ListActions {
            session_id,
            participant: ParticipantId(0),
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Actions { actions, .. } => {
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].name, "take");
        }
        other => panic!("expected Actions, got {other:?}"),
    }

    send(
        &mut ws,
        ClientMessage::Submit {
            session_id,
            participant: ParticipantId(0),
            action: take(1),
            expected_version: None,
        },
    )
    .await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerMessage::Accepted { .. }
    ));

    send(&mut ws, ClientMessage::GetHistory { session_id }).await;
    match recv(&mut ws).await.payload {
        ServerMessage::History { entries, .. } => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].version, 1);
        }
        other => panic!("expected History, got {other:?}"),
    }
}

// =========================================================================
// Subscriptions
// =========================================================================

#[tokio::test]
async fn test_subscribe_twice_is_conflict() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;
    let subscribe = ClientMessage::Subscribe {
        session_id,
        participant: ParticipantId(0),
    };

    send(&mut ws, subscribe.clone()).await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerMessage::Subscribed { .. }
    ));

    send(&mut ws, subscribe).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, 409),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsubscribe() {
    let addr = start_server().await;
    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;

    send(&mut ws, ClientMessage::Unsubscribe { session_id }).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error, got {other:?}"),
    }

    send(
        &mut ws,
        ClientMessage::Subscribe {
            session_id,
            participant: ParticipantId(0),
        },
    )
    .await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerMessage::Subscribed { .. }
    ));

    send(&mut ws, ClientMessage::Unsubscribe { session_id }).await;
    assert_eq!(
        recv(&mut ws).await.payload,
        ServerMessage::Unsubscribed { session_id }
    );
}

// =========================================================================
// Admission and lifecycle
// =========================================================================

#[tokio::test]
async fn test_create_rate_limited_per_origin() {
    let mut config = ServerConfig::default();
    config.registry.admission = AdmissionConfig {
        max_per_window: 1,
        window_secs: 60,
    };
    let addr = start_server_with(config).await;
    let mut ws = greeted(&addr).await;

    create_pile(&mut ws).await;

    // A second connection from the same host shares the budget.
    let mut other = greeted(&addr).await;
    send(
        &mut other,
        ClientMessage::CreateSession {
            game_type: "pile".into(),
            seats: vec![SeatSpec::human(), SeatSpec::human()],
            config: Value::Null,
        },
    )
    .await;
    assert!(matches!(
        recv(&mut other).await.payload,
        ServerMessage::Rejected {
            rejection: Rejection::RateLimited { .. }
        }
    ));
}

#[tokio::test]
async fn test_run_until_ends_sessions_for_subscribers() {
    let server = BoardroomServer::builder()
        .bind("127.0.0.1:0")
        .game(Pile)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let mut ws = greeted(&addr).await;
    let session_id = create_pile(&mut ws).await;
    send(
        &mut ws,
        ClientMessage::Subscribe {
            session_id,
            participant: ParticipantId(0),
        },
    )
    .await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerMessage::Subscribed { .. }
    ));

    stop.send(()).unwrap();
    running.await.unwrap().unwrap();

    match recv(&mut ws).await.payload {
        ServerMessage::Event { event } => {
            assert_eq!(
                event.kind,
                EventKind::SessionEnded {
                    reason: EndReason::Shutdown
                }
            );
        }
        other => panic!("expected SessionEnded, got {other:?}"),
    }
}
