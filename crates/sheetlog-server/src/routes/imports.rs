//! Spreadsheet import and history endpoints.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{Query, State},
    Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use sheetlog_core::import::{ImportOutcome, ImportRequest};
use sheetlog_core::versioning::{DatasetRecord, DatasetSummary, ImportSession};
use sheetlog_core::SheetFormat;

/// Query parameters for an import.
#[derive(Debug, Deserialize)]
pub struct ImportParams {
    pub dataset: Option<String>,
    /// File extension or MIME type; sniffed when absent.
    pub format: Option<String>,
    /// Schema name; resolved from configuration when absent.
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetParams {
    pub dataset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VersionParams {
    pub dataset: Option<String>,
    pub version: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub dataset_name: String,
    pub version_no: u32,
    pub records: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<String>,
}

fn require_dataset(dataset: Option<String>) -> ApiResult<String> {
    dataset
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter 'dataset' is required"))
}

fn parse_format(format: &str) -> ApiResult<SheetFormat> {
    SheetFormat::from_extension(format.trim_start_matches('.'))
        .or_else(|| SheetFormat::from_mime(format))
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported format: {}", format)))
}

/// Import a spreadsheet as the next version of a dataset.
/// POST /api/excel/import?dataset=NAME
pub async fn import_file(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: Body,
) -> ApiResult<Json<ImportOutcome>> {
    let dataset = require_dataset(params.dataset)?;
    let schema = state
        .config
        .resolve_schema(&dataset, params.schema.as_deref())?;

    let mut request = ImportRequest::new(dataset).with_schema(schema);
    if let Some(ref format) = params.format {
        request = request.with_format(parse_format(format)?);
    }

    let reader = StreamReader::new(
        body.into_data_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );
    let cancel = state.shutdown.child_token();
    let outcome = state
        .engine
        .import_and_compare(&request, reader, &cancel)
        .await?;

    info!(
        dataset = %outcome.dataset_name,
        version = outcome.new_version_no,
        "Import request completed"
    );
    Ok(Json(outcome))
}

/// Import sessions of a dataset, newest first.
/// GET /api/excel/history?dataset=NAME
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<DatasetParams>,
) -> ApiResult<Json<Vec<ImportSession>>> {
    let dataset = require_dataset(params.dataset)?;
    Ok(Json(state.engine.history(&dataset).await?))
}

/// Records written by one version.
/// GET /api/excel/changes?dataset=NAME&version=N
pub async fn get_changes(
    State(state): State<AppState>,
    Query(params): Query<VersionParams>,
) -> ApiResult<Json<Vec<DatasetRecord>>> {
    let dataset = require_dataset(params.dataset)?;
    let version = params
        .version
        .ok_or_else(|| ApiError::bad_request("Query parameter 'version' is required"))?;
    Ok(Json(state.engine.changes(&dataset, version).await?))
}

/// Aggregate statistics for a dataset.
/// GET /api/excel/summary?dataset=NAME
pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<DatasetParams>,
) -> ApiResult<Json<DatasetSummary>> {
    let dataset = require_dataset(params.dataset)?;
    state
        .engine
        .dataset_summary(&dataset)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Dataset not found: {}", dataset)))
}

/// Dataset state at a version, latest when `version` is absent.
/// GET /api/excel/snapshot?dataset=NAME[&version=N]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Query(params): Query<VersionParams>,
) -> ApiResult<Json<SnapshotResponse>> {
    let dataset = require_dataset(params.dataset)?;
    let version_no = match params.version {
        Some(v) => v,
        None => state.engine.latest_version(&dataset).await?,
    };
    if version_no == 0 {
        return Err(ApiError::not_found(format!("Dataset not found: {}", dataset)));
    }

    let snapshot = state.engine.snapshot(&dataset, Some(version_no)).await?;
    let records = snapshot
        .into_iter()
        .map(|(key, json)| {
            let value = serde_json::from_str(&json)
                .map_err(|e| ApiError::internal(format!("Stored record is not JSON: {}", e)))?;
            Ok((key, value))
        })
        .collect::<ApiResult<_>>()?;

    Ok(Json(SnapshotResponse {
        dataset_name: dataset,
        version_no,
        records,
    }))
}

/// Names of all imported datasets.
/// GET /api/excel/datasets
pub async fn list_datasets(State(state): State<AppState>) -> ApiResult<Json<DatasetsResponse>> {
    Ok(Json(DatasetsResponse {
        datasets: state.engine.datasets().await?,
    }))
}
