use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use basex_core::{ActionContext, SemanticAction};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// POST /v1/api/semantic/action: run one JSON-LD action.
///
/// Returns the action with `actionStatus` set. A handler failure is still a
/// 200; only unparseable or unroutable actions are rejected.
pub async fn semantic_action(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let action = SemanticAction::parse(&body)?;
    Ok(Json(run_action(&app, action).await?))
}

/// Execute `action` on a blocking thread and return the response document.
pub(crate) async fn run_action(app: &AppState, action: SemanticAction) -> Result<Value, AppError> {
    let config = app.config.clone();
    let store = app.object_store.clone();
    let done = tokio::task::spawn_blocking(move || {
        let ctx = ActionContext {
            config: &config,
            object_store: store.as_ref(),
        };
        basex_core::execute(action, &ctx)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(done.to_value())
}
