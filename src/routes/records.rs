//! `/dashboard/{collection}`: paged lists over the cached collections, and
//! the mutation proxy for the writable ones.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{into_view, AppState};
use crate::api::{self, Collection};
use crate::cache::ResourceState;
use crate::models::{
    decode_items, parse_timestamp, validate_readings, Alert, AuditEntry, MaintenanceTask, Shipment,
    Tank, User,
};
use crate::mutations::{is_temp_id, MutationRequest};
use crate::transform::{transform, Filter, ListQuery, PageSize, Record, SortDirection, SortSpec};
use crate::ApiError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/dashboard/{collection}", get(list).post(create))
        .route("/dashboard/{collection}/{id}", patch(update).delete(remove))
}

/// List query string. Everything is optional; an empty value means "no
/// constraint".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    status: Option<String>,
    q: Option<String>,
    sort: Option<String>,
    dir: Option<SortDirection>,
    page: Option<usize>,
    page_size: Option<usize>,
    /// `start,end`; either side may be empty.
    #[serde(rename = "timestamp_range")]
    timestamp_range: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A plain `YYYY-MM-DD` end bound covers the whole day.
fn range_bound(raw: &str, is_end: bool) -> Result<Option<DateTime<Utc>>, ApiError> {
    // ---
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if is_end {
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            let end = day
                .succ_opt()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|next| Utc.from_utc_datetime(&next) - TimeDelta::milliseconds(1));
            return Ok(end);
        }
    }
    parse_timestamp(&Value::String(raw.to_string()))
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp '{raw}'")))
}

fn list_query<T: Record>(params: &ListParams) -> Result<ListQuery, ApiError> {
    // ---
    let mut filters = Vec::new();
    if let Some(status) = non_empty(&params.status) {
        filters.push(Filter::equals("status", status));
    }
    if let Some(q) = non_empty(&params.q) {
        filters.push(Filter::search::<T>(q));
    }
    if let Some(range) = non_empty(&params.timestamp_range) {
        if T::date_field().is_empty() {
            return Err(ApiError::BadRequest(
                "this collection has no date to filter on".to_string(),
            ));
        }
        let (start, end) = range.split_once(',').ok_or_else(|| {
            ApiError::BadRequest("timestamp_range must be 'start,end'".to_string())
        })?;
        let start = range_bound(start, false)?;
        let end = range_bound(end, true)?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ApiError::BadRequest(
                    "timestamp_range starts after it ends".to_string(),
                ));
            }
        }
        filters.push(Filter::date_range::<T>(start, end));
    }

    let page_size = match params.page_size {
        Some(n) => PageSize::try_from(n).map_err(ApiError::BadRequest)?,
        None => PageSize::default(),
    };

    Ok(ListQuery {
        filters,
        sort: non_empty(&params.sort).map(|f| SortSpec::new(f, params.dir.unwrap_or_default())),
        page: params.page.unwrap_or(1),
        page_size: page_size.get(),
    })
}

/// The list inside a collection response. Bare arrays are accepted for any
/// collection; anything else without the envelope is an empty list.
fn items_of<'a>(payload: &'a Value, envelope: Option<&str>) -> &'a [Value] {
    // ---
    let list = match (payload, envelope) {
        (Value::Array(_), _) => Some(payload),
        (_, Some(key)) => payload.get(key),
        (_, None) => None,
    };
    list.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn decoder<T: DeserializeOwned>(envelope: Option<&str>) -> impl FnOnce(&Value) -> Vec<T> + '_ {
    move |payload: &Value| decode_items(items_of(payload, envelope))
}

fn respond<T>(
    resource: ResourceState<Value>,
    params: &ListParams,
    extract: impl FnOnce(&Value) -> Vec<T>,
) -> Result<Response, ApiError>
where
    T: Record + Clone + Serialize,
{
    // ---
    let query = list_query::<T>(params)?;
    let view = into_view(resource, |payload| transform(&extract(&payload), &query))?;
    debug!(
        "page {}/{} with {} of {} records",
        view.data.page,
        view.data.total_pages,
        view.data.items.len(),
        view.data.total_count
    );
    Ok(Json(view).into_response())
}

fn collection_of(name: &str) -> Result<Collection, ApiError> {
    Collection::parse(name).ok_or_else(|| ApiError::UnknownCollection(name.to_string()))
}

fn mutable_collection(name: &str) -> Result<Collection, ApiError> {
    // ---
    let collection = collection_of(name)?;
    if !collection.is_mutable() {
        return Err(ApiError::ReadOnly(name.to_string()));
    }
    Ok(collection)
}

async fn list(
    Path(name): Path<String>,
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let collection = collection_of(&name)?;
    info!("GET /dashboard/{}", collection);

    let resource = state.cache.get::<Value>(&api::collection(collection)).await;
    let envelope = collection.envelope();
    match collection {
        Collection::Tanks => respond(resource, &params, decoder::<Tank>(envelope)),
        Collection::Readings => {
            respond(resource, &params, |p| validate_readings(items_of(p, envelope)))
        }
        Collection::Shipments => respond(resource, &params, decoder::<Shipment>(envelope)),
        Collection::Alerts => respond(resource, &params, decoder::<Alert>(envelope)),
        Collection::Maintenance => respond(resource, &params, decoder::<MaintenanceTask>(envelope)),
        Collection::Users => respond(resource, &params, decoder::<User>(envelope)),
        Collection::Audit => respond(resource, &params, decoder::<AuditEntry>(envelope)),
    }
}

async fn create(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    // ---
    let collection = mutable_collection(&name)?;
    info!("POST /dashboard/{}", collection);

    // Placeholder ids from an optimistic client never reach the backend.
    if let Value::Object(map) = &mut body {
        if map.get("id").and_then(Value::as_str).is_some_and(is_temp_id) {
            map.remove("id");
        }
    }
    let created = state.mutations.execute(MutationRequest::create(collection, body)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    Path((name, id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    // ---
    let collection = mutable_collection(&name)?;
    info!("PATCH /dashboard/{}/{}", collection, id);

    let updated = state.mutations.execute(MutationRequest::update(collection, id, body)).await?;
    Ok(Json(updated))
}

async fn remove(
    Path((name, id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    // ---
    let collection = mutable_collection(&name)?;
    info!("DELETE /dashboard/{}/{}", collection, id);

    state.mutations.execute(MutationRequest::delete(collection, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::transform::Bound;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        // ---
        let map: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        let mut value = Value::Object(map);
        for key in ["page", "pageSize"] {
            if let Some(v) = value.get(key).and_then(Value::as_str).map(str::to_string) {
                value[key] = json!(v.parse::<usize>().unwrap());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_list_query_from_params() {
        // ---
        let query = list_query::<Shipment>(&params(&[
            ("status", "verified"),
            ("q", "north"),
            ("sort", "litres"),
            ("dir", "desc"),
            ("page", "2"),
            ("pageSize", "5"),
        ]))
        .unwrap();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.sort, Some(SortSpec::new("litres", SortDirection::Desc)));
        assert_eq!(query.page, 2);
        assert_eq!(query.page_size, 5);

        let defaults = list_query::<Shipment>(&ListParams::default()).unwrap();
        assert_eq!(defaults, ListQuery::default());
    }

    #[test]
    fn test_page_size_outside_options_is_rejected() {
        let err = list_query::<Shipment>(&params(&[("pageSize", "7")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_timestamp_range() {
        // ---
        let range = params(&[("timestamp_range", "2025-01-12,2025-01-17")]);
        let query = list_query::<Shipment>(&range).unwrap();
        let Filter::Range { field, min, max } = &query.filters[0] else {
            panic!("expected a range filter");
        };
        assert_eq!(field, "date");
        let start = Utc.with_ymd_and_hms(2025, 1, 12, 0, 0, 0).unwrap();
        assert_eq!(min, &Some(Bound::Date(start)));
        let end =
            Utc.with_ymd_and_hms(2025, 1, 17, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999);
        assert_eq!(max, &Some(Bound::Date(end)));

        let open_start = params(&[("timestamp_range", ",2025-01-17T08:00:00Z")]);
        let open = list_query::<Shipment>(&open_start).unwrap();
        assert!(matches!(&open.filters[0], Filter::Range { min: None, max: Some(_), .. }));
    }

    #[test]
    fn test_bad_timestamp_range_is_rejected() {
        // ---
        for raw in ["yesterday,", "2025-01-12", "2025-01-17,2025-01-12"] {
            let err = list_query::<Shipment>(&params(&[("timestamp_range", raw)])).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{raw}");
        }
        let err = list_query::<User>(&params(&[("timestamp_range", "2025-01-12,")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_items_of_envelope_and_bare_array() {
        // ---
        let wrapped = json!({"shipments": [{"id": 1}, {"id": 2}]});
        assert_eq!(items_of(&wrapped, Some("shipments")).len(), 2);
        assert!(items_of(&wrapped, Some("tasks")).is_empty());

        let bare = json!([{"id": 1}]);
        assert_eq!(items_of(&bare, None).len(), 1);
        assert_eq!(items_of(&bare, Some("shipments")).len(), 1);
        assert!(items_of(&Value::Null, None).is_empty());
    }

    #[test]
    fn test_read_only_and_unknown_collections() {
        // ---
        assert!(matches!(mutable_collection("audit"), Err(ApiError::ReadOnly(_))));
        assert!(matches!(mutable_collection("readings"), Err(ApiError::ReadOnly(_))));
        assert!(matches!(mutable_collection("fuel"), Err(ApiError::UnknownCollection(_))));
        assert_eq!(mutable_collection("shipments").unwrap(), Collection::Shipments);
    }
}
