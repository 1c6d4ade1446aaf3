//! Aggregate counts used to seed the client's badges.

use axum::{extract::State, Json};
use storedesk_shared::{CallRequestCount, PendingOrdersCount};

use crate::middleware::bearer::Bearer;
use crate::state::AppState;

pub async fn pending_orders(_auth: Bearer, State(state): State<AppState>) -> Json<PendingOrdersCount> {
    Json(PendingOrdersCount {
        pending: state.pending_orders(),
    })
}

pub async fn new_call_requests(_auth: Bearer, State(state): State<AppState>) -> Json<CallRequestCount> {
    Json(CallRequestCount {
        new: state.new_call_requests(),
    })
}
