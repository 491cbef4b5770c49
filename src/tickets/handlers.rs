use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::state::AppState;
use crate::tickets::error::TicketsError;
use crate::tickets::stats::TicketStats;
use crate::tickets::types::{
    ClassifyRequest, ClassifyResponse, CreateTicketRequest, ListQuery, Ticket, TicketFilter,
    UpdateTicketRequest,
};

/// Always answers 200. An unreadable body is treated like an empty description.
pub async fn classify_ticket(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ClassifyRequest>>,
) -> Json<ClassifyResponse> {
    let description = payload
        .and_then(|Json(req)| req.description)
        .unwrap_or_default();

    if description.is_empty() {
        return Json(ClassifyResponse::empty());
    }

    Json(state.classifier.classify(&description).await.into())
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    let filter = TicketFilter::from_query(query)?;
    let tickets = state.store.list(filter).await?;
    Ok(Json(tickets))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let Json(req) = payload?;
    let new = req.validate()?;
    let ticket = state.store.create(new).await?;
    info!("Created ticket {}", ticket.id);
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, TicketsError> {
    let id = parse_ticket_id(&id)?;
    Ok(Json(state.store.get(id).await?))
}

pub async fn patch_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> Result<Json<Ticket>, TicketsError> {
    update_ticket(&state, &id, payload, false).await
}

pub async fn put_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> Result<Json<Ticket>, TicketsError> {
    update_ticket(&state, &id, payload, true).await
}

/// An id that is not a UUID cannot name a stored ticket.
fn parse_ticket_id(raw: &str) -> Result<Uuid, TicketsError> {
    Uuid::parse_str(raw).map_err(|_| TicketsError::NotFound(format!("Ticket {raw} not found")))
}

async fn update_ticket(
    state: &AppState,
    raw_id: &str,
    payload: Result<Json<UpdateTicketRequest>, JsonRejection>,
    full: bool,
) -> Result<Json<Ticket>, TicketsError> {
    let id = parse_ticket_id(raw_id)?;
    let Json(req) = payload?;
    let changes = req.validate(full)?;
    let ticket = state.store.update(id, changes).await?;
    info!("Updated ticket {id}");
    Ok(Json(ticket))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketStats>, TicketsError> {
    let parts = state.store.stats_parts().await?;
    Ok(Json(TicketStats::from_parts(parts)))
}
