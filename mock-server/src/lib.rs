//! HTTP test peer for the client engine.
//!
//! Endpoints are shaped around what the client's integration tests need to
//! prove: a uuid-keyed item store for ordinary CRUD traffic, a status-code
//! echo for classification, a form echo for body framing, a latency endpoint
//! for concurrent dispatch, and a server-side hit counter that makes cache
//! hits observable (a cached call must not bump it).

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub qty: u32,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub qty: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub items: Arc<RwLock<HashMap<Uuid, Item>>>,
    pub hits: Arc<AtomicU64>,
}

pub fn app() -> Router {
    let state = AppState {
        items: Arc::new(RwLock::new(HashMap::new())),
        hits: Arc::new(AtomicU64::new(0)),
    };
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item))
        .route("/status/{code}", get(echo_status))
        .route("/echo", post(echo_form))
        .route("/count", get(count))
        .route("/slow/{ms}", get(slow))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    let items = state.items.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(state): State<AppState>,
    Form(input): Form<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        qty: input.qty,
    };
    state.items.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, StatusCode> {
    let items = state.items.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Respond with an arbitrary status code and a small plain-text body.
async fn echo_status(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("status {code}"))
}

/// Echo urlencoded form fields back as a JSON object.
async fn echo_form(Form(fields): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(fields).unwrap_or(serde_json::Value::Null))
}

/// Increment and return the server-side hit counter.
async fn count(State(state): State<AppState>) -> Json<serde_json::Value> {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({ "count": n }))
}

/// Respond after an artificial delay.
async fn slow(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "ok": true, "delayed_ms": ms }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_round_trips_through_json() {
        let item = Item {
            id: Uuid::nil(),
            name: "bolt".to_string(),
            qty: 7,
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, item.id);
        assert_eq!(back.name, item.name);
        assert_eq!(back.qty, item.qty);
    }

    #[test]
    fn create_item_defaults_qty_to_zero() {
        let input: CreateItem = serde_urlencoded_like("name=bolt");
        assert_eq!(input.name, "bolt");
        assert_eq!(input.qty, 0);
    }

    #[test]
    fn create_item_accepts_explicit_qty() {
        let input: CreateItem = serde_urlencoded_like("name=bolt&qty=3");
        assert_eq!(input.qty, 3);
    }

    /// Deserialize a urlencoded string the way `Form` does, via serde_json
    /// as the intermediate to avoid a direct serde_urlencoded dev-dependency.
    fn serde_urlencoded_like(raw: &str) -> CreateItem {
        let map: HashMap<String, String> = raw
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut value = serde_json::Map::new();
        for (k, v) in map {
            if k == "qty" {
                value.insert(k, serde_json::json!(v.parse::<u32>().unwrap_or(0)));
            } else {
                value.insert(k, serde_json::Value::String(v));
            }
        }
        serde_json::from_value(serde_json::Value::Object(value)).unwrap()
    }
}
