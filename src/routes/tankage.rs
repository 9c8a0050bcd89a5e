//! `GET /dashboard/tankage`: fleet KPIs, per-tank snapshots and the daily
//! volume series, trimmed to the caller's visible metrics.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{into_view, role_from, AppState, DataView};
use crate::api;
use crate::metrics::{daily_series, tank_snapshots, FleetSummary, SeriesPoint, TankSnapshot, Trend};
use crate::models::{
    decode_items, validate_readings, ReadingField, Tank, TankStatus, TankageResponse,
};
use crate::roles::{visible_for, MetricKey, Role};
use crate::ApiError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/dashboard/tankage", get(handler))
}

/// Query parameters forwarded to `GET /api/tankage`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankageQuery {
    days: Option<u32>,
    date: Option<String>,
    station_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryView {
    tank_count: usize,
    pending_readings: usize,
    rejected_readings: usize,
    metrics: BTreeMap<MetricKey, Option<f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TankView {
    tank_id: String,
    name: String,
    status: TankStatus,
    trend: Trend,
    last_reading_at: Option<DateTime<Utc>>,
    metrics: BTreeMap<MetricKey, Option<f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TankageView {
    role: Role,
    summary: SummaryView,
    tanks: Vec<TankView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_series: Option<Vec<SeriesPoint>>,
}

async fn handler(
    Query(params): Query<TankageQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<DataView<TankageView>>, ApiError> {
    // ---
    let role = role_from(&headers);
    info!("GET /dashboard/tankage - role {}", role);

    let key = api::tankage(params.days, params.date.as_deref(), params.station_id.as_deref());
    let resource = state.cache.get::<TankageResponse>(&key).await;
    let epsilon = state.config.trend_epsilon;

    let view = into_view(resource, |payload| build_view(&payload, role, epsilon))?;
    debug!("GET /dashboard/tankage - {} tanks", view.data.tanks.len());
    Ok(Json(view))
}

fn snapshot_metric(s: &TankSnapshot, key: MetricKey) -> Option<f64> {
    // ---
    match key {
        MetricKey::Volume => s.volume,
        MetricKey::Capacity => Some(s.capacity),
        MetricKey::FillPercentage => Some(s.fill_percentage),
        MetricKey::Ullage => s.ullage,
        MetricKey::VolumeChange => Some(s.volume_change),
        MetricKey::LevelMm => s.level_mm,
        MetricKey::WaterCm => s.water_cm,
        MetricKey::FlowRate => s.flow_rate,
        MetricKey::TemperatureC => s.avg_temperature_c,
        MetricKey::Density => s.avg_density,
        MetricKey::SpecificGravity => s.avg_specific_gravity,
    }
}

/// Fleet-level value of a metric; `None` means the metric has no fleet
/// aggregate and is left out of the summary.
fn summary_metric(s: &FleetSummary, key: MetricKey) -> Option<Option<f64>> {
    // ---
    match key {
        MetricKey::Volume => Some(Some(s.total_volume)),
        MetricKey::Capacity => Some(Some(s.total_capacity)),
        MetricKey::FillPercentage => Some(Some(s.fill_percentage)),
        MetricKey::Ullage => Some(Some((s.total_capacity - s.total_volume).max(0.0))),
        MetricKey::TemperatureC => Some(s.avg_temperature_c),
        MetricKey::Density => Some(s.avg_density),
        _ => None,
    }
}

fn build_view(payload: &TankageResponse, role: Role, epsilon: f64) -> TankageView {
    // ---
    let tanks: Vec<Tank> = decode_items(&payload.tanks);
    let readings = validate_readings(&payload.tankage_data);
    let snapshots = tank_snapshots(&tanks, &readings, epsilon);
    let summary = FleetSummary::from_snapshots(&snapshots);
    let visible: BTreeSet<MetricKey> = visible_for(role);

    TankageView {
        role,
        summary: SummaryView {
            tank_count: summary.tank_count,
            pending_readings: summary.pending_readings,
            rejected_readings: summary.rejected_readings,
            metrics: visible
                .iter()
                .filter_map(|&k| summary_metric(&summary, k).map(|v| (k, v)))
                .collect(),
        },
        tanks: snapshots
            .iter()
            .map(|s| TankView {
                tank_id: s.tank_id.clone(),
                name: s.name.clone(),
                status: s.status,
                trend: s.trend,
                last_reading_at: s.last_reading_at,
                metrics: visible.iter().map(|&k| (k, snapshot_metric(s, k))).collect(),
            })
            .collect(),
        volume_series: visible
            .contains(&MetricKey::Volume)
            .then(|| daily_series(&readings, ReadingField::Volume)),
    }
}
