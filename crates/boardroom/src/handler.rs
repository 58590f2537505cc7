//! Per-connection handler: handshake, request dispatch, and
//! subscription forwarding.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → validate version → send `welcome`
//!   2. Spawn a writer task that numbers and sends every outbound message
//!   3. Loop: receive envelopes → dispatch to the session registry
//!
//! Replies and subscription pushes share one outbound queue, so the
//! writer is the only place that touches `seq`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use boardroom_protocol::{
    ClientMessage, Codec, Envelope, ParticipantId, ProtocolError, ServerMessage,
    SessionId, PROTOCOL_VERSION,
};
use boardroom_session::{CreateSession, SessionError, SessionFeed, Subscription};
use boardroom_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::BoardroomError;
use crate::server::ServerState;

type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), BoardroomError> {
    let conn_id = conn.id();
    let origin = conn.peer_addr().ip().to_string();
    let start = Instant::now();
    tracing::debug!(%conn_id, %origin, "handling new connection");

    // --- Step 1: Handshake ---
    if let Err(e) = perform_handshake(&conn, &state, &start).await {
        let _ = conn.close().await;
        return Err(e);
    }
    tracing::info!(%conn_id, %origin, "client connected");

    // --- Step 2: Writer ---
    let conn = Arc::new(conn);
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        outbound_rx,
        start,
    ));

    // --- Step 3: Message loop ---
    let mut client = ClientState {
        state: &state,
        outbound,
        origin,
        start,
        subscriptions: HashMap::new(),
    };

    loop {
        let data = match tokio::time::timeout(
            state.config.connection_idle(),
            conn.recv(),
        )
        .await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                client.reply(ServerMessage::Error {
                    code: 400,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !client.dispatch(envelope.payload).await {
            tracing::info!(%conn_id, "client disconnected");
            break;
        }
    }

    // Dropping the forwarders drops their subscriptions, which detach
    // from the sessions. Dropping the last sender lets the writer drain.
    client.release_all();
    drop(client);
    let _ = writer.await;
    let _ = conn.close().await;
    Ok(())
}

/// Receives `hello`, checks the version, and answers `welcome` with seq 0.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    start: &Instant,
) -> Result<(), BoardroomError> {
    let data = match tokio::time::timeout(
        state.config.handshake_timeout(),
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(BoardroomError::Transport(e)),
        Err(_) => {
            let message = "hello timed out".to_string();
            send_error(conn, state, start, 400, &message).await?;
            return Err(ProtocolError::InvalidMessage(message).into());
        }
    };

    let message = match state.codec.decode::<Envelope<ClientMessage>>(&data) {
        Ok(Envelope {
            payload: ClientMessage::Hello { version },
            ..
        }) if version == PROTOCOL_VERSION => None,
        Ok(Envelope {
            payload: ClientMessage::Hello { version },
            ..
        }) => Some(format!(
            "unsupported protocol version {version}, expected {PROTOCOL_VERSION}"
        )),
        Ok(_) => Some("first message must be hello".to_string()),
        Err(e) => Some(e.to_string()),
    };

    if let Some(message) = message {
        send_error(conn, state, start, 400, &message).await?;
        return Err(ProtocolError::InvalidMessage(message).into());
    }

    let welcome = Envelope::new(
        0,
        elapsed_ms(start),
        ServerMessage::Welcome {
            protocol_version: PROTOCOL_VERSION,
        },
    );
    conn.send(&state.codec.encode(&welcome)?).await?;
    Ok(())
}

/// Sends an error envelope directly, before the writer exists.
async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    start: &Instant,
    code: u16,
    message: &str,
) -> Result<(), BoardroomError> {
    let envelope = Envelope::new(
        0,
        elapsed_ms(start),
        ServerMessage::Error {
            code,
            message: message.to_string(),
        },
    );
    conn.send(&state.codec.encode(&envelope)?).await?;
    Ok(())
}

/// Numbers, encodes, and sends every outbound message in queue order.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    start: Instant,
) {
    let mut seq: u64 = 1;
    while let Some(message) = outbound.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), elapsed_ms(&start), message);
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(conn_id = %conn.id(), error = %e, "failed to encode");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
            break;
        }
    }
}

/// Pushes one subscription's snapshot and events onto the outbound queue.
async fn forward(mut subscription: Subscription, outbound: Outbound) {
    while let Some(item) = subscription.recv().await {
        let message = match item {
            SessionFeed::Snapshot(snapshot) => ServerMessage::Subscribed { snapshot },
            SessionFeed::Event(event) => ServerMessage::Event { event },
        };
        if outbound.send(message).is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// ClientState
// ---------------------------------------------------------------------------

/// What the handler tracks for one connected client.
struct ClientState<'a, C: Codec> {
    state: &'a ServerState<C>,
    outbound: Outbound,
    origin: String,
    start: Instant,
    subscriptions: HashMap<SessionId, JoinHandle<()>>,
}

impl<C: Codec> ClientState<'_, C> {
    fn reply(&self, message: ServerMessage) {
        let _ = self.outbound.send(message);
    }

    fn reply_error(&self, err: SessionError) {
        match err.rejection() {
            Some(rejection) => self.reply(ServerMessage::Rejected { rejection }),
            None => self.reply(ServerMessage::Error {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }

    /// Handles one request. Returns `false` when the client asked to
    /// disconnect.
    async fn dispatch(&mut self, message: ClientMessage) -> bool {
        let state = self.state;
        let registry = &state.registry;
        match message {
            ClientMessage::Hello { .. } => self.reply(ServerMessage::Error {
                code: 400,
                message: "already greeted".into(),
            }),
            ClientMessage::Heartbeat { client_time } => {
                self.reply(ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: elapsed_ms(&self.start),
                });
            }
            ClientMessage::ListGames => self.reply(ServerMessage::GameList {
                games: registry.games(),
            }),
            ClientMessage::CreateSession {
                game_type,
                seats,
                config,
            } => {
                let request = CreateSession::new(game_type, seats)
                    .with_config(config)
                    .from_origin(self.origin.clone());
                match registry.create(request).await {
                    Ok(session_id) => {
                        self.reply(ServerMessage::SessionCreated { session_id });
                    }
                    Err(e) => self.reply_error(e),
                }
            }
            ClientMessage::GetSession {
                session_id,
                participant,
            } => match registry.get(session_id, participant).await {
                Ok(details) => self.reply(ServerMessage::SessionState {
                    info: details.info,
                    view: details.view,
                }),
                Err(e) => self.reply_error(e),
            },
            ClientMessage::ListActions {
                session_id,
                participant,
            } => match registry.valid_actions(session_id, participant).await {
                Ok(actions) => self.reply(ServerMessage::Actions {
                    session_id,
                    participant,
                    actions,
                }),
                Err(rejection) => self.reply(ServerMessage::Rejected { rejection }),
            },
            ClientMessage::GetHistory { session_id } => {
                match registry.history(session_id).await {
                    Ok(entries) => self.reply(ServerMessage::History {
                        session_id,
                        entries,
                    }),
                    Err(rejection) => self.reply(ServerMessage::Rejected { rejection }),
                }
            }
            ClientMessage::Submit {
                session_id,
                participant,
                action,
                expected_version,
            } => match registry
                .submit(session_id, participant, action, expected_version)
                .await
            {
                Ok(event) => self.reply(ServerMessage::Accepted { event }),
                Err(rejection) => self.reply(ServerMessage::Rejected { rejection }),
            },
            ClientMessage::Subscribe {
                session_id,
                participant,
            } => self.subscribe(session_id, participant).await,
            ClientMessage::Unsubscribe { session_id } => {
                match self.subscriptions.remove(&session_id) {
                    Some(forwarder) => {
                        forwarder.abort();
                        self.reply(ServerMessage::Unsubscribed { session_id });
                    }
                    None => self.reply(ServerMessage::Error {
                        code: 404,
                        message: format!("not subscribed to session {session_id}"),
                    }),
                }
            }
            ClientMessage::Disconnect { reason } => {
                tracing::debug!(origin = %self.origin, %reason, "disconnect requested");
                return false;
            }
        }
        true
    }

    async fn subscribe(&mut self, session_id: SessionId, participant: ParticipantId) {
        let active = self
            .subscriptions
            .get(&session_id)
            .is_some_and(|forwarder| !forwarder.is_finished());
        if active {
            self.reply(ServerMessage::Error {
                code: 409,
                message: format!("already subscribed to session {session_id}"),
            });
            return;
        }

        let state = self.state;
        match state.registry.subscribe(session_id, participant).await {
            Ok(subscription) => {
                tracing::debug!(
                    %session_id,
                    %participant,
                    subscriber = %subscription.id(),
                    "client subscribed"
                );
                let forwarder = tokio::spawn(forward(subscription, self.outbound.clone()));
                self.subscriptions.insert(session_id, forwarder);
            }
            Err(rejection) => self.reply(ServerMessage::Rejected { rejection }),
        }
    }

    fn release_all(&mut self) {
        for (_, forwarder) in self.subscriptions.drain() {
            forwarder.abort();
        }
    }
}

/// Returns the current sequence number and advances the counter.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

fn elapsed_ms(start: &Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
