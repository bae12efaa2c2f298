use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use engine::keywords::SpecialRecord;
use engine::persist::record_path;
use engine::similarity::TopicRecord;
use engine::ItemId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Read-only serving layer: answers recommendation queries straight
/// from the persisted shard tree. It never touches the in-memory
/// index; atomic record writes on the ingestion side make this safe
/// without coordination.
#[derive(Clone)]
pub struct AppState {
    pub topics_dir: PathBuf,
    pub specials_dir: PathBuf,
    pub shard_size: u64,
    pub max_shown: usize,
}

#[derive(Serialize)]
pub struct Recommendation {
    pub topic_id: ItemId,
    pub score: f64,
}

/// Missing or corrupt files yield `available: false` with an empty
/// list; the caller is never failed over a single bad record.
#[derive(Serialize)]
pub struct RelatedResponse {
    pub topic_id: ItemId,
    pub available: bool,
    pub recommendations: Vec<Recommendation>,
}

pub fn build_app(state: AppState) -> Router {
    // CORS: comma-separated CORS_ALLOW_ORIGIN, or allow any origin.
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/related/:topic_id", get(related_handler))
        .route("/special/:topic_id", get(special_handler))
        .with_state(state)
        .layer(cors)
}

fn read_record<R: DeserializeOwned>(path: &std::path::Path) -> Option<R> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "record unavailable");
            return None;
        }
    };
    match serde_json::from_str(&body) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "record corrupt");
            None
        }
    }
}

fn respond(topic_id: ItemId, list: Option<Vec<(ItemId, f64)>>) -> Json<RelatedResponse> {
    match list {
        Some(entries) => Json(RelatedResponse {
            topic_id,
            available: true,
            recommendations: entries
                .into_iter()
                .map(|(topic_id, score)| Recommendation { topic_id, score })
                .collect(),
        }),
        None => Json(RelatedResponse {
            topic_id,
            available: false,
            recommendations: Vec::new(),
        }),
    }
}

/// Related threads for one primary-collection topic, from the sharded
/// tree.
pub async fn related_handler(
    State(state): State<AppState>,
    Path(topic_id): Path<ItemId>,
) -> Json<RelatedResponse> {
    let path = record_path(&state.topics_dir, topic_id, Some(state.shard_size));
    let list =
        read_record::<TopicRecord>(&path).map(|rec| rec.related.top(state.max_shown).to_vec());
    respond(topic_id, list)
}

/// Matched threads for one curated topic, from the flat tree.
pub async fn special_handler(
    State(state): State<AppState>,
    Path(topic_id): Path<ItemId>,
) -> Json<RelatedResponse> {
    let path = record_path(&state.specials_dir, topic_id, None);
    let list =
        read_record::<SpecialRecord>(&path).map(|rec| rec.related.top(state.max_shown).to_vec());
    respond(topic_id, list)
}
