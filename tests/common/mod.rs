//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use mail_dispatch::DispatchConfig;

/// One request received by a mock vendor.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Responder = Arc<dyn Fn(u32) -> BoxFuture<'static, (u16, String)> + Send + Sync>;

#[derive(Clone)]
struct VendorState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    respond: Responder,
}

/// An in-process vendor API on an ephemeral port.
pub struct MockVendor {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

#[allow(dead_code)]
impl MockVendor {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().clone()
    }
}

/// Start a mock vendor that always answers with `status`.
#[allow(dead_code)]
pub async fn start_mock_vendor(status: u16) -> MockVendor {
    start_programmable_vendor(move |_| async move { (status, String::new()) }).await
}

/// Start a programmable mock vendor.
///
/// `f` receives the 1-based index of the request being answered.
pub async fn start_programmable_vendor<F, Fut>(f: F) -> MockVendor
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = VendorState {
        requests: requests.clone(),
        respond: Arc::new(move |n| f(n).boxed()),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(handle).with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockVendor { addr, requests }
}

async fn handle(
    State(state): State<VendorState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let n = {
        let mut requests = state.requests.lock();
        requests.push(CapturedRequest {
            path: uri.path().to_string(),
            headers,
            body,
        });
        requests.len() as u32
    };

    let (status, body) = (state.respond)(n).await;
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

/// SendGrid configuration aimed at `vendor`, with short backoff for tests.
#[allow(dead_code)]
pub fn sendgrid_config(vendor: &MockVendor) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.from_address = "alerts@example.com".to_string();
    config.provider.name = "SendGrid".to_string();
    config.provider.sendgrid.api_key = Some("SG.test-key".to_string());
    config.provider.sendgrid.base_url = vendor.base_url();
    config.retry.min_timeout_ms = 10;
    config.breaker.timeout_ms = 2000;
    config
}

/// Sleep helper for real-time waits.
#[allow(dead_code)]
pub async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
