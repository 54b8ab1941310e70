//! CleanupHandler - Scheduled purge of disconnected sessions
//!
//! Runs from an EventBridge schedule. Sessions stay in the table after
//! `disconnect` so their history is visible until the next purge.

use apigw_ws_common::current_timestamp_secs;
use lambda_runtime::Error;
use serde_json::Value;
use tracing::{error, info};

use crate::store::SessionStore;

/// Handler for scheduled cleanup (triggered by EventBridge)
pub async fn handle_cleanup(_event: Value, store: &dyn SessionStore) -> Result<Value, Error> {
    info!("Starting disconnected session cleanup");

    let deleted = store.purge_disconnected().await.map_err(|e| {
        error!("Failed to purge sessions: {}", e);
        format!("Cleanup failed: {}", e)
    })?;

    info!("Cleanup completed: {} sessions deleted", deleted);

    Ok(serde_json::json!({
        "sessionsDeleted": deleted,
        "timestamp": current_timestamp_secs()
    }))
}
