/// Live venue status over HTTP
/// Serves the latest evaluation to presentation surfaces (menu page badge,
/// staff dashboard) plus liveness and Prometheus endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{AccessDenied, AccessGuard, Capability};
use crate::evaluator::EvaluationResult;

/// Timeout for reading HTTP request (prevents slow-loris attacks)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request head we accept
const MAX_REQUEST_BYTES: usize = 4096;

/// Latest evaluation of one venue, as served on `/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueStatus {
    pub venue: String,
    pub timezone: String,
    #[serde(flatten)]
    pub result: EvaluationResult,
    pub evaluated_at: DateTime<Utc>,
}

/// Evaluation counters
#[derive(Debug, Clone, Default)]
pub struct BoardCounters {
    pub evaluations_ok: u64,
    pub evaluations_failed: u64,
    /// Unix epoch seconds of the last evaluation, 0 before the first one
    pub last_evaluated: u64,
}

/// Shared, caller-owned holder of the latest status.
///
/// Written by the watcher, read by the server. On a failed evaluation the
/// status is cleared so surfaces drop the badge instead of showing a stale one.
#[derive(Debug, Default)]
pub struct StatusBoard {
    evaluations_ok: AtomicU64,
    evaluations_failed: AtomicU64,
    last_evaluated: AtomicU64,
    current: RwLock<Option<VenueStatus>>,
    last_error: RwLock<Option<String>>,
    weekly: RwLock<Vec<String>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful evaluation
    pub fn publish(&self, status: VenueStatus, weekly: Vec<String>) {
        self.evaluations_ok.fetch_add(1, Ordering::Relaxed);
        self.touch();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(status);
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.weekly.write().unwrap_or_else(|e| e.into_inner()) = weekly;
    }

    /// Record a failed evaluation
    pub fn publish_error(&self, error: String) {
        self.evaluations_failed.fetch_add(1, Ordering::Relaxed);
        self.touch();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    fn touch(&self) {
        self.last_evaluated.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            Ordering::Relaxed,
        );
    }

    pub fn current(&self) -> Option<VenueStatus> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn weekly(&self) -> Vec<String> {
        self.weekly.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn counters(&self) -> BoardCounters {
        BoardCounters {
            evaluations_ok: self.evaluations_ok.load(Ordering::Relaxed),
            evaluations_failed: self.evaluations_failed.load(Ordering::Relaxed),
            last_evaluated: self.last_evaluated.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Status,
    Metrics,
    Schedule,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        // Ignore query strings
        let path = path.split('?').next().unwrap_or(path);
        match path.trim_end_matches('/') {
            "/health" | "/healthz" => Some(Route::Health),
            "/status" => Some(Route::Status),
            "/metrics" => Some(Route::Metrics),
            "/schedule" => Some(Route::Schedule),
            _ => None,
        }
    }

    fn capability(self) -> Capability {
        match self {
            Route::Health | Route::Status | Route::Metrics => Capability::ReadStatus,
            Route::Schedule => Capability::ReadSchedule,
        }
    }
}

/// Parsed request head; only what routing needs
#[derive(Debug, Default, PartialEq)]
struct Request<'a> {
    path: &'a str,
    bearer: Option<&'a str>,
}

fn parse_request(raw: &str) -> Request<'_> {
    let mut lines = raw.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let bearer = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .and_then(|(_, value)| {
            let value = value.trim();
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        });

    Request { path, bearer }
}

/// Status HTTP server bound to its socket; dropped or cancelled to stop.
pub struct StatusServer {
    listener: TcpListener,
    board: Arc<StatusBoard>,
    guard: Arc<AccessGuard>,
}

impl StatusServer {
    pub async fn bind(
        addr: SocketAddr,
        board: Arc<StatusBoard>,
        guard: AccessGuard,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            board,
            guard: Arc::new(guard),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `cancel_token` fires
    pub async fn serve(self, cancel_token: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            info!("Status server listening on http://{}/status", addr);
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((mut socket, peer_addr)) => {
                            let board = self.board.clone();
                            let guard = self.guard.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, &board, &guard).await {
                                    debug!("Error handling request from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!("Status server shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    board: &StatusBoard,
    guard: &AccessGuard,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];

    let n = match timeout(REQUEST_TIMEOUT, socket.read(&mut buf)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("Request timeout after {:?}", REQUEST_TIMEOUT);
            return Ok(());
        }
    };

    if n == 0 {
        return Ok(());
    }

    let raw = String::from_utf8_lossy(&buf[..n]);
    let response = respond(&parse_request(&raw), board, guard);

    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;

    Ok(())
}

/// Route, authorize, then run the handler
fn respond(request: &Request<'_>, board: &StatusBoard, guard: &AccessGuard) -> String {
    let Some(route) = Route::from_path(request.path) else {
        return build_json_response(404, "Not Found", r#"{"error":"Not Found"}"#);
    };

    let role = guard.role_for(request.bearer);
    if let Err(denied) = guard.authorize(role, route.capability()) {
        return build_denied_response(&denied);
    }

    match route {
        Route::Health => build_health_response(&board.counters()),
        Route::Status => build_status_response(board.current(), board.last_error()),
        Route::Metrics => build_metrics_response(&board.counters(), board.current().as_ref()),
        Route::Schedule => build_schedule_response(&board.weekly()),
    }
}

fn build_json_response(code: u16, reason: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        body.len(),
        body
    )
}

fn build_health_response(counters: &BoardCounters) -> String {
    let body = format!(
        r#"{{"status":"healthy","evaluations_ok":{},"evaluations_failed":{},"last_evaluated":{}}}"#,
        counters.evaluations_ok, counters.evaluations_failed, counters.last_evaluated
    );
    build_json_response(200, "OK", &body)
}

fn build_status_response(current: Option<VenueStatus>, last_error: Option<String>) -> String {
    match current {
        Some(status) => match serde_json::to_string(&status) {
            Ok(body) => build_json_response(200, "OK", &body),
            Err(e) => {
                let body = serde_json::json!({ "error": e.to_string() }).to_string();
                build_json_response(500, "Internal Server Error", &body)
            }
        },
        None => {
            let error = last_error.unwrap_or_else(|| "status not evaluated yet".to_string());
            let body = serde_json::json!({ "error": error }).to_string();
            build_json_response(503, "Service Unavailable", &body)
        }
    }
}

fn build_schedule_response(weekly: &[String]) -> String {
    let body = serde_json::json!({ "week": weekly }).to_string();
    build_json_response(200, "OK", &body)
}

fn build_denied_response(denied: &AccessDenied) -> String {
    let (code, reason) = denied.status();
    let body = serde_json::json!({ "error": denied.to_string() }).to_string();
    build_json_response(code, reason, &body)
}

fn build_metrics_response(counters: &BoardCounters, current: Option<&VenueStatus>) -> String {
    // Prometheus-compatible metrics format
    let open = match current {
        Some(s) if s.result.is_open => 1,
        _ => 0,
    };
    let next = current
        .and_then(|s| s.result.next_transition)
        .map(|t| t.timestamp())
        .unwrap_or(0);
    let body = format!(
        "# HELP cartita_evaluations_total Total number of opening-hours evaluations\n\
         # TYPE cartita_evaluations_total counter\n\
         cartita_evaluations_total{{result=\"ok\"}} {}\n\
         cartita_evaluations_total{{result=\"failed\"}} {}\n\
         # HELP cartita_last_evaluation_timestamp Unix timestamp of last evaluation\n\
         # TYPE cartita_last_evaluation_timestamp gauge\n\
         cartita_last_evaluation_timestamp {}\n\
         # HELP cartita_venue_open Whether the venue is open (1) or closed (0)\n\
         # TYPE cartita_venue_open gauge\n\
         cartita_venue_open {}\n\
         # HELP cartita_next_transition_timestamp Unix timestamp of the next open/closed flip, 0 if none\n\
         # TYPE cartita_next_transition_timestamp gauge\n\
         cartita_next_transition_timestamp {}\n",
        counters.evaluations_ok, counters.evaluations_failed, counters.last_evaluated, open, next
    );

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}
