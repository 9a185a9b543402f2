// src/server/mod.rs

pub mod proxy;

use crate::{
    corrections::{self, Correction},
    error::Error,
    store::DataStore,
    table::Table,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tracing::{info, warn};
use warp::{http::StatusCode, Filter, Rejection, Reply};

/// Name of the running-adjustment log kept under the data root.
const ADJUSTMENTS_FILE: &str = "forecast_adjustments.json";

#[derive(Deserialize)]
struct ApplyCorrectionsRequest {
    corrections: Vec<Correction>,
    #[serde(rename = "filePath")]
    file_path: String,
}

#[derive(Deserialize)]
struct SaveCsvRequest {
    #[serde(rename = "csvContent")]
    csv_content: String,
    #[serde(rename = "filePath")]
    file_path: String,
}

#[derive(Deserialize)]
struct SaveJsonRequest {
    #[serde(rename = "jsonData")]
    json_data: Vec<serde_json::Value>,
    #[serde(rename = "filePath")]
    file_path: String,
}

#[derive(Deserialize)]
struct SaveForecastRequest {
    adjustments: Vec<serde_json::Value>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl MessageResponse {
    fn ok(message: &str) -> Self {
        Self {
            message: message.to_string(),
            error: None,
        }
    }

    fn err(message: &str, detail: String) -> Self {
        Self {
            message: message.to_string(),
            error: Some(detail),
        }
    }
}

/// All routes of the service, rejection handling included.
pub fn routes(
    store: Arc<DataStore>,
    proxy_ctx: Arc<proxy::ProxyContext>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let health = warp::path("health").and(warp::get()).and_then(health);

    let apply = warp::path!("api" / "apply-corrections")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(apply_corrections);

    let save_csv = warp::path!("api" / "save-csv")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(save_csv);

    let save_json = warp::path!("api" / "save-json")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(save_json);

    let save_forecast = warp::path!("api" / "save-forecast")
        .and(warp::post())
        .and(with_store(store))
        .and(warp::body::json())
        .and_then(save_forecast);

    let forecast_proxy = warp::path!("api" / "forecast")
        .and(warp::any().map(move || proxy_ctx.clone()))
        .and(warp::method())
        .and(raw_query())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .and_then(proxy::forward);

    health
        .or(apply)
        .or(save_csv)
        .or(save_json)
        .or(save_forecast)
        .or(forecast_proxy)
        .recover(handle_rejection)
}

fn with_store(
    store: Arc<DataStore>,
) -> impl Filter<Extract = (Arc<DataStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

async fn health() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "forecastd"
    })))
}

async fn apply_corrections(
    store: Arc<DataStore>,
    req: ApplyCorrectionsRequest,
) -> Result<impl Reply, Infallible> {
    info!(
        corrections = req.corrections.len(),
        file = %req.file_path,
        "applying corrections"
    );

    match merge_and_persist(&store, &req).await {
        Ok(updated) => {
            info!(rows_updated = updated, "corrections applied");
            Ok(warp::reply::with_status(
                warp::reply::json(&MessageResponse::ok("Corrections applied successfully")),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            warn!(file = %req.file_path, error = %e, "failed to apply corrections");
            Ok(error_reply("Failed to apply corrections", &e))
        }
    }
}

/// Whole read-merge-write cycle under the destination's lock, so two
/// concurrent requests against the same file serialize instead of the
/// later write silently dropping the earlier one.
async fn merge_and_persist(
    store: &DataStore,
    req: &ApplyCorrectionsRequest,
) -> crate::error::Result<usize> {
    let path = store.resolve(&req.file_path)?;
    let lock = store.lock_for(&path);
    let _guard = lock.lock().await;

    let content = store.read_resolved(&path)?;
    let mut table = Table::parse(&content)?;
    let updated = corrections::apply(&mut table, &req.corrections)?;
    store.write_resolved(&path, &table.to_csv()?)?;
    Ok(updated)
}

async fn save_csv(store: Arc<DataStore>, req: SaveCsvRequest) -> Result<impl Reply, Infallible> {
    if req.csv_content.is_empty() {
        return Ok(error_reply(
            "Missing required parameters",
            &Error::Validation("csvContent is empty".to_string()),
        ));
    }

    match locked_write(&store, &req.file_path, &req.csv_content).await {
        Ok(()) => {
            info!(file = %req.file_path, "saved csv");
            Ok(warp::reply::with_status(
                warp::reply::json(&MessageResponse::ok("File saved successfully")),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            warn!(file = %req.file_path, error = %e, "failed to save csv");
            Ok(error_reply("Failed to save CSV file", &e))
        }
    }
}

async fn save_json(store: Arc<DataStore>, req: SaveJsonRequest) -> Result<impl Reply, Infallible> {
    let pretty = match serde_json::to_string_pretty(&req.json_data) {
        Ok(s) => s,
        Err(e) => {
            return Ok(error_reply(
                "Failed to save JSON file",
                &Error::Validation(e.to_string()),
            ))
        }
    };

    match locked_write(&store, &req.file_path, &pretty).await {
        Ok(()) => {
            info!(file = %req.file_path, records = req.json_data.len(), "saved json");
            Ok(warp::reply::with_status(
                warp::reply::json(&MessageResponse::ok("File saved successfully")),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            warn!(file = %req.file_path, error = %e, "failed to save json");
            Ok(error_reply("Failed to save JSON file", &e))
        }
    }
}

/// Append the adjustment batch, stamped with the server's clock, to the
/// running log under the data root.
async fn save_forecast(
    store: Arc<DataStore>,
    req: SaveForecastRequest,
) -> Result<impl Reply, Infallible> {
    match append_adjustments(&store, &req).await {
        Ok(total) => {
            info!(batches = total, "recorded forecast adjustments");
            Ok(warp::reply::with_status(
                warp::reply::json(&MessageResponse::ok("Forecast adjustments saved")),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            warn!(error = %e, "failed to save forecast adjustments");
            Ok(error_reply("Failed to save forecast", &e))
        }
    }
}

async fn append_adjustments(
    store: &DataStore,
    req: &SaveForecastRequest,
) -> crate::error::Result<usize> {
    let path = store.resolve(ADJUSTMENTS_FILE)?;
    let lock = store.lock_for(&path);
    let _guard = lock.lock().await;

    let mut log: serde_json::Value = match store.read_resolved(&path) {
        Ok(content) => serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("corrupt adjustments log: {e}")))?,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            serde_json::json!({ "adjustments": [] })
        }
        Err(e) => return Err(e),
    };

    let entries = log
        .get_mut("adjustments")
        .and_then(|v| v.as_array_mut())
        .ok_or_else(|| Error::Parse("adjustments log is not an object with a list".to_string()))?;

    entries.push(serde_json::json!({
        "adjustments": req.adjustments,
        "client_timestamp": req.timestamp,
        "timestamp": Utc::now().to_rfc3339(),
    }));
    let total = entries.len();

    let content = serde_json::to_string_pretty(&log)
        .map_err(|e| Error::Parse(format!("serializing adjustments log: {e}")))?;
    store.write_resolved(&path, &content)?;
    Ok(total)
}

async fn locked_write(store: &DataStore, relative: &str, content: &str) -> crate::error::Result<()> {
    let path = store.resolve(relative)?;
    let lock = store.lock_for(&path);
    let _guard = lock.lock().await;
    store.write_resolved(&path, content)
}

fn error_reply(message: &str, error: &Error) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&MessageResponse::err(message, error.to_string())),
        error_status(error),
    )
}

fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) | Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
        Error::Parse(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map warp's rejections onto the JSON shapes the API has always returned.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found", None)
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            Some(e.to_string()),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
    } else {
        warn!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
    };

    let body = MessageResponse {
        message: message.to_string(),
        error: detail,
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
