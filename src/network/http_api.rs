use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::protocol::Visibility;
use crate::session::registry::SessionRegistry;

/// Lightweight HTTP API for lobby discovery, separate from the WebSocket
/// game server.
///
/// - `POST /sessions?visibility=public|private` creates a session
/// - `GET /sessions` lists public sessions still in their lobby
/// - `GET /sessions/{code}` reports whether a session exists
pub async fn serve(listener: TcpListener, registry: Arc<SessionRegistry>) {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP API listening on http://{}", addr);
    }

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("HTTP API accept error: {}", e);
                continue;
            }
        };

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let mut parts = request.lines().next().unwrap_or("").split_whitespace();
            let method = parts.next().unwrap_or("");
            let target = parts.next().unwrap_or("");
            debug!("HTTP {} {}", method, target);

            let response = match route(method, target, &registry) {
                Reply::NoContent => "HTTP/1.1 204 No Content\r\n\
                    Access-Control-Allow-Origin: *\r\n\
                    Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
                    Access-Control-Allow-Headers: Content-Type\r\n\
                    \r\n"
                    .to_string(),
                Reply::Json(status, body) => format!(
                    "HTTP/1.1 {}\r\n\
                    Content-Type: application/json\r\n\
                    Access-Control-Allow-Origin: *\r\n\
                    Content-Length: {}\r\n\
                    \r\n\
                    {}",
                    status,
                    body.len(),
                    body,
                ),
            };
            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}

#[derive(Debug, PartialEq)]
enum Reply {
    NoContent,
    Json(&'static str, String),
}

fn route(method: &str, target: &str, registry: &Arc<SessionRegistry>) -> Reply {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = path.trim_end_matches('/');

    match (method, path) {
        // CORS preflight
        ("OPTIONS", _) => Reply::NoContent,
        ("POST", "/sessions") => {
            let visibility = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "visibility")
                .map(|(_, value)| Visibility::parse(value));
            match visibility {
                Some(None) => Reply::Json(
                    "400 Bad Request",
                    json!({ "error": "visibility must be public or private" }).to_string(),
                ),
                Some(Some(visibility)) => created(registry, visibility),
                None => created(registry, Visibility::Public),
            }
        }
        ("GET", "/sessions") => Reply::Json(
            "200 OK",
            serde_json::to_string(&registry.list_open()).unwrap_or_else(|_| "[]".to_string()),
        ),
        ("GET", _) => match path.strip_prefix("/sessions/") {
            Some(code) if !code.is_empty() => Reply::Json(
                "200 OK",
                json!({ "exists": registry.exists(code) }).to_string(),
            ),
            _ => not_found(),
        },
        _ => not_found(),
    }
}

fn created(registry: &Arc<SessionRegistry>, visibility: Visibility) -> Reply {
    let code = registry.create(visibility);
    Reply::Json("201 Created", json!({ "code": code }).to_string())
}

fn not_found() -> Reply {
    Reply::Json("404 Not Found", json!({ "error": "not found" }).to_string())
}
