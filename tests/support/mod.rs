#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP server answering with scripted responses in order. The last response is
/// repeated once the script runs out.
pub struct Responder {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct Script {
    responses: Arc<Vec<(StatusCode, String)>>,
    served: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Responder {
    pub async fn start(script: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let responses: Vec<(StatusCode, String)> = script.into_iter()
            .map(|(status, body)| (StatusCode::from_u16(status).unwrap(), body.to_string()))
            .collect();
        let app = Router::new()
            .fallback(respond)
            .with_state(Script {
                responses: Arc::new(responses),
                served: Arc::new(AtomicUsize::new(0)),
                requests: Arc::clone(&requests),
            });

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Responder { addr, requests, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(
    State(script): State<Script>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // recorded before answering so the client never observes a response first
    script.requests.lock().push(Request {
        method: method.to_string(),
        target: uri.to_string(),
        headers: headers.iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let served = script.served.fetch_add(1, Ordering::SeqCst);
    let (status, body) = script.responses[served.min(script.responses.len() - 1)].clone();

    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Accepts connections and never answers.
pub async fn silent() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });

    (addr, handle)
}

/// An address nothing is listening on.
pub async fn refused() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
