//! Local HTTP server that records every request, for client tests.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::routing::{any, MethodRouter};
use axum::Router;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub(crate) struct Captured {
    pub method: Method,
    /// Path and query.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub(crate) type RequestLog = Arc<Mutex<Vec<Captured>>>;

/// Route handler that records the request and answers with `reply`.
pub(crate) fn recorder(log: &RequestLog, reply: fn(&Captured) -> Response) -> MethodRouter {
    let log = log.clone();
    any(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
        let log = log.clone();
        async move {
            let captured = Captured {
                method,
                uri: uri.to_string(),
                headers,
                body: body.to_vec(),
            };
            let response = reply(&captured);
            log.lock().push(captured);
            response
        }
    })
}

/// Serve `router` on an ephemeral port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
