//! Record Query Routes
//!
//! Read endpoints over the file index.
//!
//! - GET /api/v1/records/time - Records overlapping a time range
//! - GET /api/v1/records/work/:work_id - Records for one work unit
//! - GET /api/v1/records/latest - Most recent record for (what, where)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    LatestQueryParams, RecordDto, RecordPageResponse, TimeQueryParams, WorkQueryParams,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::{Cursor, QueryPage};

/// GET /api/v1/records/time
///
/// Page through every record whose interval overlaps `[start, end]`.
pub async fn query_time(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimeQueryParams>,
) -> ApiResult<Json<RecordPageResponse>> {
    if params.end < params.start {
        return Err(ApiError::Validation(
            "end must not be before start".to_string(),
        ));
    }
    let cursor = decode_cursor(params.cursor.as_deref())?;
    let page = state
        .engine
        .query_by_time(
            params.start,
            params.end,
            &params.what,
            params.where_.as_deref(),
            cursor,
        )
        .await?;
    Ok(Json(page_response(page)))
}

/// GET /api/v1/records/work/:work_id
///
/// Page through every record produced by one work unit.
pub async fn query_work(
    State(state): State<Arc<AppState>>,
    Path(work_id): Path<String>,
    Query(params): Query<WorkQueryParams>,
) -> ApiResult<Json<RecordPageResponse>> {
    let cursor = decode_cursor(params.cursor.as_deref())?;
    let page = state
        .engine
        .query_by_work_id(&work_id, &params.what, params.where_.as_deref(), cursor)
        .await?;
    Ok(Json(page_response(page)))
}

/// GET /api/v1/records/latest
///
/// The most recent record for a (what, where) pair, or 404 when nothing
/// exists inside the lookback window. Served by the lookback-bounded
/// bucket scan rather than the store's latest pointer, which is unbounded
/// and cannot honor the window.
pub async fn query_latest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestQueryParams>,
) -> ApiResult<Json<RecordDto>> {
    let record = state
        .engine
        .query_latest(&params.what, &params.where_, params.lookback.as_deref())
        .await?;
    match record {
        Some(record) => Ok(Json(record.into())),
        None => Err(ApiError::NotFound(format!(
            "no record for {}:{}",
            params.what, params.where_
        ))),
    }
}

fn decode_cursor(token: Option<&str>) -> ApiResult<Option<Cursor>> {
    match token {
        None => Ok(None),
        Some(t) => Ok(Some(Cursor::decode(t)?)),
    }
}

fn page_response(page: QueryPage) -> RecordPageResponse {
    RecordPageResponse {
        records: page.records.into_iter().map(RecordDto::from).collect(),
        next_cursor: page.next_cursor.map(|c| c.encode()),
    }
}
