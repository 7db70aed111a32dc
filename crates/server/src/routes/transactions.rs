use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Local;
use flatfile_core::validate::parse_transaction_id;
use flatfile_core::{RecordDraft, TransactionId, TransactionPatch, TransactionRecord};
use flatfile_import::Reconciliation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required, AppState};
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    let collection = get(list_all).post(add).put(update).delete(delete);
    Router::new()
        .route("/transactions", collection.clone())
        .route("/transactions/", collection)
        .route("/transactions/get_by_id", get(get_by_id))
        .route("/transactions/get_by_description", get(get_by_description))
        .route("/transactions/get_by_date", get(get_by_date))
        .route("/transactions/sort", get(sort))
        .route("/transactions/reconcile", get(reconcile))
        .route("/transactions/reconcile-csv", get(reconcile_csv))
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction: TransactionRecord,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub file_1: String,
    pub file_2: String,
    #[serde(flatten)]
    pub report: Reconciliation,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ByIdParams {
    pub file_name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ByDescriptionParams {
    pub file_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ByDateParams {
    pub file_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SortParams {
    pub file_name: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddParams {
    pub file_name: Option<String>,
    pub transaction_id: Option<String>,
    pub bank: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateParams {
    pub file_name: Option<String>,
    pub transaction_id: Option<String>,
    pub bank: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub file_name: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileParams {
    pub file_1: Option<String>,
    pub file_2: Option<String>,
}

fn transaction_id(name: &str, value: Option<String>) -> Result<TransactionId, ApiError> {
    let raw = required(name, value)?;
    parse_transaction_id(&raw).map_err(|e| ApiError::bad_request(&e.to_string()))
}

async fn list_all(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let transactions = state.rows.list_all(&file_name).await?;
    Ok(Json(TransactionsResponse { transactions }))
}

async fn get_by_id(
    State(state): State<AppState>,
    Query(params): Query<ByIdParams>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let id = transaction_id("id", params.id)?;
    let transaction = state.rows.get_by_id(&file_name, id).await?;
    Ok(Json(TransactionResponse { transaction }))
}

async fn get_by_description(
    State(state): State<AppState>,
    Query(params): Query<ByDescriptionParams>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let description = required("description", params.description)?;
    let transactions = state.rows.filter_by_description(&file_name, &description).await?;
    Ok(Json(TransactionsResponse { transactions }))
}

async fn get_by_date(
    State(state): State<AppState>,
    Query(params): Query<ByDateParams>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let start_date = required("start_date", params.start_date)?;
    let today = Local::now().date_naive();
    let transactions = state
        .rows
        .filter_by_date_range(&file_name, &start_date, params.end_date.as_deref(), today)
        .await?;
    Ok(Json(TransactionsResponse { transactions }))
}

async fn sort(
    State(state): State<AppState>,
    Query(params): Query<SortParams>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let sort_by = required("sort_by", params.sort_by)?;
    let order = required("order", params.order)?;
    let transactions = state.rows.sort(&file_name, &sort_by, &order).await?;
    Ok(Json(TransactionsResponse { transactions }))
}

async fn add(
    State(state): State<AppState>,
    Query(params): Query<AddParams>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let draft = RecordDraft {
        transaction_id: params.transaction_id,
        bank: params.bank,
        date: params.date,
        amount: params.amount,
        description: params.description,
    };
    let transactions = state.rows.add(&file_name, draft).await?;
    Ok(Json(TransactionsResponse { transactions }))
}

async fn update(
    State(state): State<AppState>,
    Query(params): Query<UpdateParams>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let id = transaction_id("transaction_id", params.transaction_id)?;
    let patch = TransactionPatch {
        bank: params.bank,
        date: params.date,
        amount: params.amount,
        description: params.description,
    };
    let transaction = state.rows.update(&file_name, id, patch).await?;
    Ok(Json(TransactionResponse { transaction }))
}

async fn delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let id = transaction_id("transaction_id", params.transaction_id)?;
    state.rows.delete(&file_name, id).await?;
    Ok(Json(json!({ "detail": format!("Transaction ID {id} has been deleted") })))
}

async fn reconcile(
    State(state): State<AppState>,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let file_1 = required("file_1", params.file_1)?;
    let file_2 = required("file_2", params.file_2)?;
    let report = state.reconciler.compare(&file_1, &file_2).await?;
    Ok(Json(ReconcileResponse { file_1, file_2, report }))
}

async fn reconcile_csv(
    State(state): State<AppState>,
    Query(params): Query<ReconcileParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_1 = required("file_1", params.file_1)?;
    let file_2 = required("file_2", params.file_2)?;
    let csv = state.reconciler.export(&file_1, &file_2).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"reconcile.csv\""),
        ],
        csv,
    ))
}
