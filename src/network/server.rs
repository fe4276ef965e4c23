use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::codec::{self, WireFormat};
use crate::error::JoinError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::broadcast::CONNECTION_BUFFER;
use crate::session::registry::SessionRegistry;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Accept WebSocket clients on `listener` until it fails.
///
/// Each client connects to `/ws/{code}` and must send `join` first; after
/// that its frames are forwarded to the session as they arrive.
pub async fn serve(listener: TcpListener, registry: Arc<SessionRegistry>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("WebSocket accept error: {}", e);
                continue;
            }
        };
        debug!("New connection from {}", addr);
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            handle_connection(stream, registry).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, registry: Arc<SessionRegistry>) {
    let mut requested = None;
    let ws_stream = match accept_hdr_async(stream, |req: &Request, resp: Response| {
        requested = session_code_from_path(req.uri().path());
        Ok(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();

    // ── Membership ──────────────────────────────────────────────────
    let (format, username) = loop {
        match ws_read.next().await {
            Some(Ok(frame)) => match codec::decode_frame(&frame) {
                Some((format, Ok(ClientMessage::Join { username }))) => break (format, username),
                Some((_, Ok(other))) => debug!("Ignoring {:?} before join", other),
                Some((_, Err(e))) => debug!("Undecodable frame before join: {}", e),
                None => {}
            },
            Some(Err(e)) => {
                debug!("Connection dropped before join: {}", e);
                return;
            }
            None => return,
        }
    };

    let Some(code) = requested else {
        refuse(&mut ws_write, format, JoinError::MissingSessionCode).await;
        return;
    };
    let Some(session) = registry.lookup(&code) else {
        refuse(&mut ws_write, format, JoinError::SessionNotFound(code)).await;
        return;
    };

    let player = registry.next_player_id();
    let (client_tx, client_rx) = mpsc::channel(CONNECTION_BUFFER);
    if let Err(e) = session.join(player, username, client_tx).await {
        info!("Refused join to {}: {}", session.code(), e);
        refuse(&mut ws_write, format, e).await;
        return;
    }

    // ── Write task ──────────────────────────────────────────────────
    tokio::spawn(write_loop(ws_write, client_rx, format));

    // ── Read loop ───────────────────────────────────────────────────
    while let Some(result) = ws_read.next().await {
        match result {
            Ok(frame) => match codec::decode_frame(&frame) {
                Some((_, Ok(message))) => session.client(player, message),
                Some((_, Err(e))) => warn!("Failed to decode message from {}: {}", player, e),
                None => {
                    if frame.is_close() {
                        break;
                    }
                }
            },
            Err(e) => {
                debug!("WebSocket read error for {}: {}", player, e);
                break;
            }
        }
    }
    session.leave(player);
}

/// Forward session messages to the socket until the session drops its
/// handle for this connection.
async fn write_loop(
    mut ws_write: WsSink,
    mut client_rx: mpsc::Receiver<Arc<ServerMessage>>,
    format: WireFormat,
) {
    while let Some(message) = client_rx.recv().await {
        let frame = match codec::encode_server(format, &message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {:?}: {}", message, e);
                continue;
            }
        };
        if let Err(e) = ws_write.send(frame).await {
            debug!("Failed to send WebSocket message: {}", e);
            break;
        }
    }
    let _ = ws_write.close().await;
}

/// Tell the client why it can't join, then close.
async fn refuse(ws_write: &mut WsSink, format: WireFormat, reason: JoinError) {
    let message = ServerMessage::Error {
        reason: reason.to_string(),
    };
    match codec::encode_server(format, &message) {
        Ok(frame) => {
            if let Err(e) = ws_write.send(frame).await {
                debug!("Failed to send join error: {}", e);
            }
        }
        Err(e) => error!("Failed to encode join error: {}", e),
    }
    let _ = ws_write.close().await;
}

/// `/ws/ABCDE` or `/ws/ABCDE/` → `ABCDE`.
fn session_code_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/ws/")?;
    let code = rest.trim_end_matches('/');
    (!code.is_empty() && !code.contains('/')).then(|| code.to_string())
}
