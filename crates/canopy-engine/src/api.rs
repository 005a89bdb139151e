//! HTTP API for Canopy.
//!
//! Amounts travel as decimal strings (`"250.00"`), ids as their display form
//! (`"CUS000042"`).

use crate::account::{CreditLedgerEntry, WalletEntry, WithdrawalRecord};
use crate::error::Error;
use crate::hierarchy::{FranchiseMember, HierarchyNode};
use crate::network::Network;
use crate::placement::Placement;
use crate::snapshot::NodeView;
use crate::turnover::{PurchaseReceipt, TurnoverSummary};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use canopy_payout::Money;
use canopy_topology::{NodeId, Side};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<Network>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (at root and under /api/v1 for compatibility)
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Registry
        .route("/api/v1/founders", get(list_founders))
        .route("/api/v1/customers", post(register_customer))
        .route("/api/v1/brand-owners", post(register_brand_owner))
        .route("/api/v1/nodes/:id", get(get_node))
        .route("/api/v1/contacts/:contact", get(get_by_contact))
        .route("/api/v1/nodes/:id/referrals", get(list_referrals))
        // Structure
        .route("/api/v1/nodes/:id/hierarchy", get(get_hierarchy))
        .route("/api/v1/nodes/:id/franchise/:leg", get(get_franchise))
        // Turnover
        .route("/api/v1/purchases", post(record_purchase))
        .route("/api/v1/nodes/:id/turnover", get(get_turnover))
        .route("/api/v1/nodes/:id/credits", get(get_credits))
        // Wallet
        .route("/api/v1/nodes/:id/top-up", post(top_up))
        .route(
            "/api/v1/nodes/:id/withdrawals",
            get(list_withdrawals).post(request_withdrawal),
        )
        .route("/api/v1/nodes/:id/wallet", get(get_wallet))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Errors ---

/// JSON error body with a status derived from the engine error.
#[derive(Debug)]
pub struct ApiError(Error);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateContact(_) | Error::NoEligibleSlot(_) | Error::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            Error::InvalidSponsor(_)
            | Error::OutOfRange(_)
            | Error::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Durability { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Topology(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("API error: {}", self.0);
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn node_id(raw: &str) -> Result<NodeId, ApiError> {
    NodeId::parse(raw).map_err(|e| ApiError(Error::InvalidInput(e.to_string())))
}

fn leg(raw: &str) -> Result<Side, ApiError> {
    Side::from_leg(raw)
        .ok_or_else(|| ApiError(Error::InvalidInput(format!("unknown leg {:?}", raw))))
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

// --- Registry endpoints ---

async fn list_founders(State(network): State<AppState>) -> ApiResult<Vec<NodeView>> {
    Ok(Json(network.founders()?))
}

#[derive(Debug, Deserialize)]
struct RegisterCustomerRequest {
    name: String,
    contact: String,
    sponsor_id: Option<String>,
}

async fn register_customer(
    State(network): State<AppState>,
    Json(req): Json<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<Placement>), ApiError> {
    let sponsor = req.sponsor_id.as_deref().map(node_id).transpose()?;
    let placement = network.register_customer(&req.name, &req.contact, sponsor.as_ref())?;
    Ok((StatusCode::CREATED, Json(placement)))
}

#[derive(Debug, Deserialize)]
struct RegisterBrandOwnerRequest {
    name: String,
    contact: String,
}

async fn register_brand_owner(
    State(network): State<AppState>,
    Json(req): Json<RegisterBrandOwnerRequest>,
) -> Result<(StatusCode, Json<Placement>), ApiError> {
    let placement = network.register_brand_owner(&req.name, &req.contact)?;
    Ok((StatusCode::CREATED, Json(placement)))
}

async fn get_node(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NodeView> {
    Ok(Json(network.view(&node_id(&id)?)?))
}

async fn get_by_contact(
    State(network): State<AppState>,
    Path(contact): Path<String>,
) -> ApiResult<NodeView> {
    let snapshot = network.by_contact(&contact)?;
    Ok(Json(NodeView::from(&snapshot)))
}

async fn list_referrals(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<NodeView>> {
    Ok(Json(network.direct_referrals(&node_id(&id)?)?))
}

// --- Structure endpoints ---

#[derive(Debug, Deserialize)]
struct HierarchyQuery {
    depth: Option<u32>,
}

async fn get_hierarchy(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HierarchyQuery>,
) -> ApiResult<HierarchyNode> {
    let depth = query.depth.unwrap_or(3);
    Ok(Json(network.hierarchy(&node_id(&id)?, depth)?))
}

async fn get_franchise(
    State(network): State<AppState>,
    Path((id, raw_leg)): Path<(String, String)>,
) -> ApiResult<Vec<FranchiseMember>> {
    Ok(Json(network.franchise(&node_id(&id)?, leg(&raw_leg)?)?))
}

// --- Turnover endpoints ---

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    node_id: String,
    value: Money,
}

async fn record_purchase(
    State(network): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseReceipt>), ApiError> {
    let receipt = network.record_purchase(&node_id(&req.node_id)?, req.value)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn get_turnover(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TurnoverSummary> {
    Ok(Json(network.turnover_summary(&node_id(&id)?)?))
}

async fn get_credits(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CreditLedgerEntry>> {
    Ok(Json(network.credit_ledger(&node_id(&id)?)?))
}

// --- Wallet endpoints ---

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: Money,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    spendable_balance: Money,
}

async fn top_up(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<BalanceResponse> {
    let spendable_balance = network.top_up_spendable(&node_id(&id)?, req.amount)?;
    Ok(Json(BalanceResponse { spendable_balance }))
}

async fn list_withdrawals(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<WithdrawalRecord>> {
    Ok(Json(network.withdrawals(&node_id(&id)?)?))
}

async fn request_withdrawal(
    State(network): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<WithdrawalRecord>), ApiError> {
    let record = network.request_withdrawal(&node_id(&id)?, req.amount)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_wallet(
    State(network): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<WalletEntry>> {
    Ok(Json(network.wallet_entries(&node_id(&id)?)?))
}
