//! Test support: an in-memory token store and a minimal HTTP stub standing in
//! for the auth backend.

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lexlink_auth::{AuthConfig, SessionManager};
use lexlink_storage::{StorageResult, TokenStorage, TokenStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// In-memory storage for tests.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl TokenStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }
}

pub fn memory_store() -> TokenStore {
    TokenStore::new(Arc::new(MemoryStorage::default()))
}

/// Mint an unsigned-but-well-formed compact token for the given payload.
pub fn mint_token(payload: Value) -> String {
    let b64 = |bytes: &[u8]| URL_SAFE_NO_PAD.encode(bytes);
    let header = json!({ "alg": "HS256", "typ": "JWT" });
    format!(
        "{}.{}.{}",
        b64(&serde_json::to_vec(&header).unwrap()),
        b64(&serde_json::to_vec(&payload).unwrap()),
        b64(b"test-signature")
    )
}

pub fn mint_access_token(subject: &str, roles: &[&str], exp: i64) -> String {
    mint_token(json!({
        "sub": subject,
        "roles": roles,
        "email": "alice@example.com",
        "profileId": "profile-1",
        "exp": exp,
    }))
}

pub fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

/// Mutable behavior knobs and counters for the stub server.
#[derive(Default)]
pub struct ServerState {
    pub otp_requests: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    /// When set, OTP dispatch requests are rejected with 429.
    pub otp_rejects: AtomicBool,
    /// When set, every refresh is rejected with 401.
    pub refresh_rejects: AtomicBool,
    /// Artificial latency for refresh responses, in milliseconds.
    pub refresh_delay_ms: AtomicUsize,
    /// The code the server accepts.
    pub expected_otp: Mutex<String>,
    /// The access token `/auth/me` accepts; anything else is 401.
    pub current_access: Mutex<Option<String>>,
    /// The refresh token `/auth/refresh` accepts.
    pub current_refresh: Mutex<Option<String>>,
    /// `exp` claim embedded in newly issued access tokens.
    pub issued_exp: Mutex<i64>,
    serial: AtomicUsize,
}

impl ServerState {
    pub fn set_issued_exp(&self, exp: i64) {
        *self.issued_exp.lock().unwrap() = exp;
    }

    fn issue_tokens(&self) -> (String, String) {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let exp = *self.issued_exp.lock().unwrap();
        let access = mint_access_token("user-1", &["CLIENT"], exp);
        let refresh = format!("refresh-{serial}");
        *self.current_access.lock().unwrap() = Some(access.clone());
        *self.current_refresh.lock().unwrap() = Some(refresh.clone());
        (access, refresh)
    }
}

/// A raw TCP stub speaking just enough HTTP/1.1 for the auth endpoints.
pub struct StubServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState::default());
        *state.expected_otp.lock().unwrap() = "123456".to_string();
        state.set_issued_exp(far_future());

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    handle(stream, state).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Build a session manager pointed at this server, with the default
    /// 60-second refresh lead and no resend cooldown (tests opt back in).
    pub fn session_manager(&self, store: TokenStore) -> SessionManager {
        let config = AuthConfig::new(self.base_url())
            .unwrap()
            .with_otp_resend_cooldown(Duration::ZERO);
        SessionManager::new(config, store)
    }
}

struct Request {
    method: String,
    path: String,
    bearer: Option<String>,
    body: Value,
}

async fn handle(mut stream: TcpStream, state: Arc<ServerState>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    let response = route(&request, &state).await;
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut bearer = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse().unwrap_or(0),
            "authorization" => bearer = value.strip_prefix("Bearer ").map(str::to_string),
            _ => {}
        }
    }

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let body = if content_length > 0 && buffer.len() >= body_start + content_length {
        serde_json::from_slice(&buffer[body_start..body_start + content_length])
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    };

    Some(Request {
        method,
        path,
        bearer,
        body,
    })
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

async fn route(request: &Request, state: &Arc<ServerState>) -> String {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/auth/request-otp-email") | ("POST", "/auth/request-otp") => {
            state.otp_requests.fetch_add(1, Ordering::SeqCst);
            if state.otp_rejects.load(Ordering::SeqCst) {
                return respond(
                    429,
                    "Too Many Requests",
                    &json!({ "message": "Too many requests" }),
                );
            }
            respond(200, "OK", &json!({ "message": "OTP sent" }))
        }
        ("POST", "/auth/verify-otp-email") | ("POST", "/auth/verify-otp") => {
            state.verify_calls.fetch_add(1, Ordering::SeqCst);
            let submitted = request
                .body
                .get("otp")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let expected = state.expected_otp.lock().unwrap().clone();
            if submitted != expected {
                return respond(
                    401,
                    "Unauthorized",
                    &json!({ "message": "Invalid or expired OTP" }),
                );
            }
            let (access, refresh) = state.issue_tokens();
            respond(
                200,
                "OK",
                &json!({
                    "data": {
                        "accessToken": access,
                        "refreshToken": refresh,
                        "user": { "id": "user-1", "roles": ["CLIENT"] },
                    }
                }),
            )
        }
        ("POST", "/auth/refresh") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }
            if state.refresh_rejects.load(Ordering::SeqCst) {
                return respond(
                    401,
                    "Unauthorized",
                    &json!({ "message": "Refresh token expired" }),
                );
            }
            let expected = state.current_refresh.lock().unwrap().clone();
            if expected.is_some() && request.bearer != expected {
                return respond(
                    401,
                    "Unauthorized",
                    &json!({ "message": "Unknown refresh token" }),
                );
            }
            let (access, refresh) = state.issue_tokens();
            respond(
                200,
                "OK",
                &json!({ "data": { "accessToken": access, "refreshToken": refresh } }),
            )
        }
        ("GET", "/auth/me") => {
            state.me_calls.fetch_add(1, Ordering::SeqCst);
            let valid = state.current_access.lock().unwrap().clone();
            if valid.is_some() && request.bearer == valid {
                respond(
                    200,
                    "OK",
                    &json!({
                        "data": {
                            "id": "user-1",
                            "email": "alice@example.com",
                            "phoneNumber": null,
                            "createdAt": "2025-01-01T00:00:00Z",
                            "updatedAt": "2025-06-01T00:00:00Z",
                            "lastLogin": "2025-06-02T00:00:00Z",
                            "accountStatus": "ACTIVE",
                            "roles": ["CLIENT"],
                        }
                    }),
                )
            } else {
                respond(401, "Unauthorized", &json!({ "message": "Unauthorized" }))
            }
        }
        _ => respond(404, "Not Found", &json!({ "message": "Not found" })),
    }
}

// `Connection: close` keeps the HTTP client from reusing sockets against
// this one-request-per-connection stub.
fn respond(status: u16, reason: &str, body: &Value) -> String {
    let body = body.to_string();
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
