//! `POST /warmup`: confirms the embedding index is loaded and the
//! configured retriever endpoint is reachable before traffic arrives.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ComponentStatus {
    ok: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
pub struct WarmupResponse {
    components: std::collections::HashMap<String, ComponentStatus>,
    elapsed_ms: u64,
}

pub async fn warmup(State(state): State<AppState>) -> Json<WarmupResponse> {
    let engine = state.current_engine().await;
    let start = Instant::now();

    let mut components = std::collections::HashMap::new();
    components.insert(
        "index".to_string(),
        ComponentStatus {
            ok: !engine.index.is_empty(),
            detail: format!("{} entries", engine.index.len()),
        },
    );

    let probe = engine.embedding_client.embed(&["warmup probe".to_string()]).await;
    components.insert(
        "embedding_client".to_string(),
        match &probe {
            Ok(_) => ComponentStatus {
                ok: true,
                detail: "probe embed succeeded".to_string(),
            },
            Err(e) => ComponentStatus {
                ok: false,
                detail: e.to_string(),
            },
        },
    );

    if probe.is_err() {
        tracing::warn!("warmup probe embed failed");
    }

    Json(WarmupResponse {
        components,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}
