// src/items.rs
//! Demo item list kept in process memory. Resets on restart.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

struct Inner {
    items: Vec<Item>,
    next_id: u64,
}

pub struct ItemStore {
    inner: Mutex<Inner>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn list(&self) -> Vec<Item> {
        self.inner.lock().await.items.clone()
    }

    /// Appends an item with the next id. `name` is stored trimmed.
    pub async fn push(&self, name: &str) -> Item {
        let mut inner = self.inner.lock().await;
        let item = Item {
            id: inner.next_id,
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        inner.next_id += 1;
        inner.items.push(item.clone());
        item
    }
}

/// GET /api/items
pub async fn list_items(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "items": state.items.list().await }))
}

/// POST /api/items
///
/// A body that is not JSON is treated as `{}`.
pub async fn create_item(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));

    let name = match payload.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid payload: \"name\" (non-empty string) is required"
                })),
            )
                .into_response();
        }
    };

    let item = state.items.push(name).await;
    tracing::debug!("Created item {} ({})", item.id, item.name);

    (StatusCode::CREATED, Json(json!({ "item": item }))).into_response()
}
