//! In-process stand-in for the relay, serving fixed pin values:
//! V0 = 23.5, V1 = ["41"], V2 = 1, V9 = "idle".

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{extract::Query, http::StatusCode, routing::get, Router};

pub const TOKEN: &str = "device-token";

pub type Writes = Arc<Mutex<Vec<(String, String)>>>;

pub struct StubRelay {
    pub base_url: String,
    /// `(pin, value)` pairs received on `/update`, in order.
    pub writes: Writes,
}

impl StubRelay {
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

pub async fn spawn() -> StubRelay {
    let writes = Writes::default();
    let recorded = writes.clone();

    let app = Router::new()
        .route(
            "/get",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                if q.get("token").map(String::as_str) != Some(TOKEN) {
                    return (StatusCode::BAD_REQUEST, "Invalid token.".to_owned());
                }
                match q.get("pin").map(String::as_str) {
                    Some("V0") => (StatusCode::OK, "23.5".to_owned()),
                    Some("V1") => (StatusCode::OK, r#"["41"]"#.to_owned()),
                    Some("V2") => (StatusCode::OK, "1".to_owned()),
                    Some("V9") => (StatusCode::OK, r#""idle""#.to_owned()),
                    _ => (StatusCode::BAD_REQUEST, "Wrong pin.".to_owned()),
                }
            }),
        )
        .route(
            "/update",
            get(move |Query(q): Query<HashMap<String, String>>| async move {
                if q.get("token").map(String::as_str) != Some(TOKEN) {
                    return StatusCode::BAD_REQUEST;
                }
                match (q.get("pin"), q.get("value")) {
                    (Some(pin), Some(value)) => {
                        recorded.lock().unwrap().push((pin.clone(), value.clone()));
                        StatusCode::OK
                    }
                    _ => StatusCode::BAD_REQUEST,
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    StubRelay {
        base_url: format!("http://{addr}"),
        writes,
    }
}

/// Base URL on which nothing listens.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";
