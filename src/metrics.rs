//! Derived metrics: fill levels, aggregates, changes and trends.
//!
//! Everything here is a pure function of its inputs. Nothing panics or
//! returns an error on bad numbers: a dashboard would rather show `0` or
//! `"N/A"` for one broken field than fail the whole view.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Reading, ReadingField, Tank, TankStatus, VerificationStatus};

// ---

/// Coerce a JSON value to a finite number, `0` otherwise.
///
/// Numbers and numeric strings (`"12.5"`, `" 7 "`) are accepted. Null, bools,
/// arrays, objects, empty or non-numeric strings and non-finite results all
/// map to `0`.
pub fn to_safe_number(v: &Value) -> f64 {
    // ---
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Percentage of `capacity` filled by `current_volume`, clamped to `[0, 100]`.
pub fn fill_percentage(current_volume: f64, capacity: f64) -> f64 {
    // ---
    let volume = finite_or_zero(current_volume);
    let capacity = finite_or_zero(capacity);
    if capacity <= 0.0 {
        return 0.0;
    }
    (volume / capacity * 100.0).clamp(0.0, 100.0)
}

/// Mean of `values`; `0` for an empty slice. Non-finite entries count as `0`.
pub fn average(values: &[f64]) -> f64 {
    // ---
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().copied().map(finite_or_zero).sum();
    if sum.is_finite() {
        return sum / n;
    }
    // The sum overflowed; scale each value down first.
    finite_or_zero(values.iter().copied().map(|v| finite_or_zero(v) / n).sum())
}

/// Change from `previous` to `current` in percent; `0` when `previous` is `0`.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    // ---
    let current = finite_or_zero(current);
    let previous = finite_or_zero(previous);
    if previous == 0.0 {
        return 0.0;
    }
    finite_or_zero((current - previous) / previous * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Direction between the two most recent samples.
///
/// Samples need not be sorted. A difference within `epsilon` (absolute) is
/// `Stable`, as is anything with fewer than two samples.
pub fn derive_trend(samples: &[Sample], epsilon: f64) -> Trend {
    // ---
    let mut latest: Option<&Sample> = None;
    let mut previous: Option<&Sample> = None;
    for s in samples {
        if latest.map_or(true, |l| s.timestamp >= l.timestamp) {
            previous = latest;
            latest = Some(s);
        } else if previous.map_or(true, |p| s.timestamp >= p.timestamp) {
            previous = Some(s);
        }
    }

    let (Some(latest), Some(previous)) = (latest, previous) else {
        return Trend::Stable;
    };
    let diff = finite_or_zero(latest.value) - finite_or_zero(previous.value);
    if diff > epsilon.abs() {
        Trend::Increasing
    } else if diff < -epsilon.abs() {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Summary statistics over a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Stats {
    /// All-zero for an empty input.
    pub fn of(values: &[f64]) -> Self {
        // ---
        if values.is_empty() {
            return Stats::default();
        }
        let values: Vec<f64> = values.iter().copied().map(finite_or_zero).collect();
        Stats {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: average(&values),
        }
    }
}

/// Display form of an optional metric: `"N/A"` when absent.
pub fn format_metric(value: Option<f64>, decimals: usize) -> String {
    // ---
    match value {
        Some(v) => format!("{:.*}", decimals, finite_or_zero(v)),
        None => "N/A".to_string(),
    }
}

/// Average of `field` over readings that carry it; `None` when none do.
fn mean_of<'a>(readings: impl Iterator<Item = &'a Reading>, field: ReadingField) -> Option<f64> {
    // ---
    let values: Vec<f64> = readings.filter_map(|r| r.value(field)).collect();
    if values.is_empty() {
        None
    } else {
        Some(average(&values))
    }
}

/// Per-tank view derived from the tank and its readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TankSnapshot {
    // ---
    pub tank_id: String,
    pub name: String,
    pub status: TankStatus,
    pub capacity: f64,
    pub last_reading_at: Option<DateTime<Utc>>,
    pub volume: Option<f64>,
    pub fill_percentage: f64,
    pub ullage: Option<f64>,
    pub volume_change: f64,
    pub trend: Trend,
    pub level_mm: Option<f64>,
    pub water_cm: Option<f64>,
    pub flow_rate: Option<f64>,
    pub avg_temperature_c: Option<f64>,
    pub avg_density: Option<f64>,
    pub avg_specific_gravity: Option<f64>,
    pub pending_readings: usize,
    pub rejected_readings: usize,
}

/// Build one snapshot per tank, in the order the tanks were given.
///
/// Rejected readings are counted but excluded from every value. The latest
/// reading (by timestamp, then id) supplies the point-in-time fields; the
/// averages run over all remaining readings of the tank.
pub fn tank_snapshots(tanks: &[Tank], readings: &[Reading], epsilon: f64) -> Vec<TankSnapshot> {
    // ---
    let mut by_tank: HashMap<&str, Vec<&Reading>> = HashMap::new();
    for r in readings {
        by_tank.entry(r.entity_id.as_str()).or_default().push(r);
    }

    tanks
        .iter()
        .map(|tank| {
            let all = by_tank.get(tank.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let pending_readings = all
                .iter()
                .filter(|r| r.status == VerificationStatus::Pending)
                .count();
            let rejected_readings = all
                .iter()
                .filter(|r| r.status == VerificationStatus::Rejected)
                .count();

            let mut usable: Vec<&Reading> = all
                .iter()
                .copied()
                .filter(|r| r.status != VerificationStatus::Rejected)
                .collect();
            usable.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

            let volume_samples: Vec<Sample> = usable
                .iter()
                .filter_map(|r| {
                    r.volume.map(|value| Sample {
                        timestamp: r.timestamp,
                        value,
                    })
                })
                .collect();

            let latest = usable.last().copied();
            let volume = volume_samples.last().map(|s| s.value);
            let volume_change = match volume_samples.as_slice() {
                [.., prev, last] => percent_change(last.value, prev.value),
                _ => 0.0,
            };

            TankSnapshot {
                tank_id: tank.id.clone(),
                name: tank.name.clone(),
                status: tank.status,
                capacity: tank.capacity,
                last_reading_at: latest.map(|r| r.timestamp),
                volume,
                fill_percentage: volume.map_or(0.0, |v| fill_percentage(v, tank.capacity)),
                ullage: volume.map(|v| (tank.capacity - v).max(0.0)),
                volume_change,
                trend: derive_trend(&volume_samples, epsilon),
                level_mm: latest.and_then(|r| r.level_mm),
                water_cm: latest.and_then(|r| r.water_cm),
                flow_rate: latest.and_then(|r| r.flow_rate),
                avg_temperature_c: mean_of(usable.iter().copied(), ReadingField::TemperatureC),
                avg_density: mean_of(usable.iter().copied(), ReadingField::Density),
                avg_specific_gravity: mean_of(
                    usable.iter().copied(),
                    ReadingField::SpecificGravity,
                ),
                pending_readings,
                rejected_readings,
            }
        })
        .collect()
}

/// Fleet-wide KPIs for the overview cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    // ---
    pub tank_count: usize,
    pub total_volume: f64,
    pub total_capacity: f64,
    pub fill_percentage: f64,
    pub avg_temperature_c: Option<f64>,
    pub avg_density: Option<f64>,
    pub pending_readings: usize,
    pub rejected_readings: usize,
}

impl FleetSummary {
    pub fn from_snapshots(snapshots: &[TankSnapshot]) -> Self {
        // ---
        let total_volume: f64 = snapshots.iter().filter_map(|s| s.volume).map(finite_or_zero).sum();
        let total_capacity: f64 = snapshots
            .iter()
            .map(|s| finite_or_zero(s.capacity).max(0.0))
            .sum();
        let temps: Vec<f64> = snapshots.iter().filter_map(|s| s.avg_temperature_c).collect();
        let densities: Vec<f64> = snapshots.iter().filter_map(|s| s.avg_density).collect();

        FleetSummary {
            tank_count: snapshots.len(),
            total_volume,
            total_capacity,
            fill_percentage: fill_percentage(total_volume, total_capacity),
            avg_temperature_c: (!temps.is_empty()).then(|| average(&temps)),
            avg_density: (!densities.is_empty()).then(|| average(&densities)),
            pending_readings: snapshots.iter().map(|s| s.pending_readings).sum(),
            rejected_readings: snapshots.iter().map(|s| s.rejected_readings).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily average of `field` over non-rejected readings, oldest day first.
/// Days without a value for `field` are omitted.
pub fn daily_series(readings: &[Reading], field: ReadingField) -> Vec<SeriesPoint> {
    // ---
    let mut days: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for r in readings {
        if r.status == VerificationStatus::Rejected {
            continue;
        }
        if let Some(v) = r.value(field) {
            days.entry(r.timestamp.date_naive()).or_default().push(v);
        }
    }
    days.into_iter()
        .map(|(date, values)| SeriesPoint {
            date,
            value: average(&values),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    fn reading(id: &str, tank: &str, ts: DateTime<Utc>, volume: Option<f64>) -> Reading {
        // ---
        Reading {
            id: id.to_string(),
            timestamp: ts,
            entity_id: tank.to_string(),
            volume,
            level_mm: None,
            temperature_c: None,
            specific_gravity: None,
            water_cm: None,
            density: None,
            flow_rate: None,
            status: VerificationStatus::Verified,
        }
    }

    fn tank(id: &str, capacity: f64) -> Tank {
        // ---
        Tank {
            id: id.to_string(),
            name: format!("Tank {id}"),
            capacity,
            status: TankStatus::Active,
            location: None,
            station_id: None,
        }
    }

    #[test]
    fn test_fill_percentage_bounds() {
        // ---
        assert_eq!(fill_percentage(500.0, 1000.0), 50.0);
        assert_eq!(fill_percentage(1500.0, 1000.0), 100.0);
        assert_eq!(fill_percentage(-20.0, 1000.0), 0.0);
        assert_eq!(fill_percentage(500.0, 0.0), 0.0);
        assert_eq!(fill_percentage(500.0, -10.0), 0.0);
        assert_eq!(fill_percentage(f64::NAN, 1000.0), 0.0);
        assert_eq!(fill_percentage(500.0, f64::INFINITY), 0.0);

        for v in [0.0, 1.0, 999.0, 1e9] {
            for c in [0.5, 1.0, 1000.0] {
                let pct = fill_percentage(v, c);
                assert!((0.0..=100.0).contains(&pct), "{v}/{c} gave {pct}");
            }
        }
    }

    #[test]
    fn test_average() {
        // ---
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(average(&[10.0, f64::NAN]), 5.0);
        assert_eq!(average(&[f64::MAX, f64::MAX]), f64::MAX);
        assert!(average(&[f64::MAX, f64::MAX, f64::MAX]).is_finite());
    }

    #[test]
    fn test_percent_change() {
        // ---
        assert_eq!(percent_change(120.0, 100.0), 20.0);
        assert_eq!(percent_change(80.0, 100.0), -20.0);
        assert_eq!(percent_change(42.0, 0.0), 0.0);
        assert_eq!(percent_change(-5.0, 0.0), 0.0);
    }

    #[test]
    fn test_to_safe_number() {
        // ---
        assert_eq!(to_safe_number(&json!(12.5)), 12.5);
        assert_eq!(to_safe_number(&json!(" 7 ")), 7.0);
        assert_eq!(to_safe_number(&json!("abc")), 0.0);
        assert_eq!(to_safe_number(&json!("")), 0.0);
        assert_eq!(to_safe_number(&json!("NaN")), 0.0);
        assert_eq!(to_safe_number(&json!("inf")), 0.0);
        assert_eq!(to_safe_number(&json!(null)), 0.0);
        assert_eq!(to_safe_number(&json!(true)), 0.0);
        assert_eq!(to_safe_number(&json!([1])), 0.0);
    }

    #[test]
    fn test_derive_trend() {
        // ---
        let s = |day, value| Sample {
            timestamp: at(day, 0),
            value,
        };
        assert_eq!(derive_trend(&[], 0.1), Trend::Stable);
        assert_eq!(derive_trend(&[s(9, 10.0)], 0.1), Trend::Stable);
        assert_eq!(derive_trend(&[s(9, 10.0), s(10, 12.0)], 0.1), Trend::Increasing);
        assert_eq!(derive_trend(&[s(9, 10.0), s(10, 8.0)], 0.1), Trend::Decreasing);
        assert_eq!(derive_trend(&[s(9, 10.0), s(10, 10.05)], 0.1), Trend::Stable);

        // Unordered input: only the two most recent matter.
        let samples = [s(12, 50.0), s(9, 100.0), s(11, 40.0), s(10, 0.0)];
        assert_eq!(derive_trend(&samples, 0.1), Trend::Increasing);
    }

    #[test]
    fn test_stats_and_format() {
        // ---
        assert_eq!(Stats::of(&[]), Stats::default());
        let stats = Stats::of(&[4.0, 1.0, 7.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 7.0);
        assert_eq!(stats.mean, 4.0);

        assert_eq!(format_metric(Some(21.456), 1), "21.5");
        assert_eq!(format_metric(None, 1), "N/A");
    }

    #[test]
    fn test_tank_snapshots() {
        // ---
        let tanks = vec![tank("T-01", 10_000.0), tank("T-02", 0.0), tank("T-03", 5_000.0)];
        let mut rejected = reading("r4", "T-01", at(12, 0), Some(9_999.0));
        rejected.status = VerificationStatus::Rejected;
        let mut warm = reading("r2", "T-01", at(10, 0), Some(5_000.0));
        warm.temperature_c = Some(24.0);
        let mut cool = reading("r3", "T-01", at(11, 0), Some(6_000.0));
        cool.temperature_c = Some(20.0);
        cool.level_mm = Some(1_830.0);

        let readings = vec![
            cool,
            reading("r1", "T-01", at(9, 0), Some(4_000.0)),
            warm,
            rejected,
            reading("r5", "T-02", at(9, 0), Some(100.0)),
        ];

        let snaps = tank_snapshots(&tanks, &readings, 0.1);
        assert_eq!(snaps.len(), 3);

        let t1 = &snaps[0];
        assert_eq!(t1.volume, Some(6_000.0));
        assert_eq!(t1.fill_percentage, 60.0);
        assert_eq!(t1.ullage, Some(4_000.0));
        assert_eq!(t1.volume_change, 20.0);
        assert_eq!(t1.trend, Trend::Increasing);
        assert_eq!(t1.level_mm, Some(1_830.0));
        assert_eq!(t1.avg_temperature_c, Some(22.0));
        assert_eq!(t1.avg_density, None);
        assert_eq!(t1.rejected_readings, 1);
        assert_eq!(t1.last_reading_at, Some(at(11, 0)));

        // Zero capacity never divides.
        assert_eq!(snaps[1].fill_percentage, 0.0);

        // No readings at all.
        let t3 = &snaps[2];
        assert_eq!(t3.volume, None);
        assert_eq!(t3.fill_percentage, 0.0);
        assert_eq!(t3.trend, Trend::Stable);
        assert_eq!(t3.last_reading_at, None);
    }

    #[test]
    fn test_fleet_summary() {
        // ---
        let tanks = vec![tank("A", 1_000.0), tank("B", 3_000.0)];
        let readings = vec![
            reading("1", "A", at(9, 0), Some(500.0)),
            reading("2", "B", at(9, 0), Some(1_500.0)),
        ];
        let summary = FleetSummary::from_snapshots(&tank_snapshots(&tanks, &readings, 0.1));
        assert_eq!(summary.tank_count, 2);
        assert_eq!(summary.total_volume, 2_000.0);
        assert_eq!(summary.total_capacity, 4_000.0);
        assert_eq!(summary.fill_percentage, 50.0);
        assert_eq!(summary.avg_temperature_c, None);

        let empty = FleetSummary::from_snapshots(&[]);
        assert_eq!(empty.fill_percentage, 0.0);
    }

    #[test]
    fn test_daily_series() {
        // ---
        let mut rejected = reading("x", "A", at(10, 12), Some(1_000_000.0));
        rejected.status = VerificationStatus::Rejected;
        let readings = vec![
            reading("3", "A", at(10, 6), Some(300.0)),
            reading("1", "A", at(9, 6), Some(100.0)),
            reading("2", "A", at(9, 18), Some(200.0)),
            rejected,
            reading("4", "A", at(11, 6), None),
        ];
        let series = daily_series(&readings, ReadingField::Volume);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());
        assert_eq!(series[0].value, 150.0);
        assert_eq!(series[1].value, 300.0);
    }
}
