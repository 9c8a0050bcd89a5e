//! Data models for the tankage dashboard.
//!
//! Backend records arrive with loose shapes: ids as strings or numbers,
//! numeric fields as numbers, numeric strings or nothing at all. Everything is
//! normalised here, once, at the I/O edge. Past this module the rest of the
//! crate sees typed fields only.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::metrics::to_safe_number;
use crate::transform::{FieldValue, Record};

// ---

/// Verification state shared by readings and fuel deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Pending,
    Rejected,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TankStatus {
    Active,
    Maintenance,
    Offline,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    #[default]
    Unknown,
}

/// Case-insensitive parsing for the backend's status strings. Anything we do
/// not recognise becomes the enum's `Unknown` variant.
trait LooseEnum: Sized + Default {
    fn parse(s: &str) -> Self;
}

impl LooseEnum for VerificationStatus {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "verified" => Self::Verified,
            "pending" => Self::Pending,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        }
    }
}

impl LooseEnum for TankStatus {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "operational" => Self::Active,
            "maintenance" => Self::Maintenance,
            "offline" | "inactive" => Self::Offline,
            _ => Self::Unknown,
        }
    }
}

impl LooseEnum for AlertSeverity {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" => Self::Critical,
            "warning" | "medium" => Self::Warning,
            "info" | "low" => Self::Info,
            _ => Self::Unknown,
        }
    }
}

impl LooseEnum for TaskStatus {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "scheduled" | "pending" => Self::Scheduled,
            "in_progress" | "inprogress" => Self::InProgress,
            "completed" | "done" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl TankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance => "maintenance",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Unknown => "unknown",
        }
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

// --- loose field decoding

/// Ids come back as `"T-01"` or `17`; both become strings.
pub(crate) fn id_from_value(v: &Value) -> Option<String> {
    // ---
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS`, plain `YYYY-MM-DD` (midnight
/// UTC) and epoch milliseconds.
pub(crate) fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    // ---
    match v {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Absent or `null` stays `None` (rendered "N/A"); anything else present is
/// coerced, so a malformed value reads as `0`.
fn optional_number(v: &Value) -> Option<f64> {
    // ---
    match v {
        Value::Null => None,
        other => Some(to_safe_number(other)),
    }
}

fn loose_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    // ---
    let v = Value::deserialize(d)?;
    id_from_value(&v).ok_or_else(|| serde::de::Error::custom("id must be a string or number"))
}

fn loose_optional_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    // ---
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(id_from_value))
}

fn loose_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    // ---
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().map(to_safe_number).unwrap_or(0.0))
}

/// First of several spellings of a date that actually parses.
fn first_timestamp(candidates: &[&Value]) -> Option<DateTime<Utc>> {
    candidates.iter().find_map(|v| parse_timestamp(v))
}

/// First spelling that is present; malformed values still coerce to `0`.
fn first_number(candidates: &[&Value]) -> f64 {
    // ---
    candidates
        .iter()
        .find(|v| !v.is_null())
        .map(|v| to_safe_number(v))
        .unwrap_or(0.0)
}

fn loose_enum<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: LooseEnum,
{
    // ---
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) => T::parse(&s),
        _ => T::default(),
    })
}

fn default_true() -> bool {
    true
}

// --- readings

/// Raw reading as the backend sends it. Every field is optional and loosely
/// typed; see [`RawReading::to_validated`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    // ---
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub date: Value,
    #[serde(default)]
    pub created_at: Value,
    #[serde(default)]
    pub entity_id: Value,
    #[serde(default)]
    pub tank_id: Value,
    #[serde(default)]
    pub line_id: Value,
    #[serde(default)]
    pub volume: Value,
    #[serde(default)]
    pub level_mm: Value,
    #[serde(default)]
    pub temperature_c: Value,
    #[serde(default)]
    pub specific_gravity: Value,
    #[serde(default)]
    pub water_cm: Value,
    #[serde(default)]
    pub density: Value,
    #[serde(default)]
    pub flow_rate: Value,
    #[serde(default)]
    pub status: Value,
}

/// Validated, immutable sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub volume: Option<f64>,
    pub level_mm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub specific_gravity: Option<f64>,
    pub water_cm: Option<f64>,
    pub density: Option<f64>,
    pub flow_rate: Option<f64>,
    pub status: VerificationStatus,
}

/// Numeric reading fields, addressable by name for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingField {
    Volume,
    LevelMm,
    TemperatureC,
    SpecificGravity,
    WaterCm,
    Density,
    FlowRate,
}

impl ReadingField {
    pub fn parse(name: &str) -> Option<Self> {
        // ---
        Some(match name {
            "volume" => Self::Volume,
            "levelMm" => Self::LevelMm,
            "temperatureC" => Self::TemperatureC,
            "specificGravity" => Self::SpecificGravity,
            "waterCm" => Self::WaterCm,
            "density" => Self::Density,
            "flowRate" => Self::FlowRate,
            _ => return None,
        })
    }
}

impl RawReading {
    // ---
    /// Validate into a [`Reading`].
    ///
    /// The timestamp may arrive as `timestamp`, `date` or `createdAt` and the
    /// entity as `entityId`, `tankId` or `lineId`; the first usable spelling
    /// wins. Returns `None` when the id, entity id or timestamp is missing or
    /// unparseable; such records are dropped rather than half-rendered.
    pub fn to_validated(&self) -> Option<Reading> {
        // ---
        Some(Reading {
            id: id_from_value(&self.id)?,
            timestamp: first_timestamp(&[&self.timestamp, &self.date, &self.created_at])?,
            entity_id: [&self.entity_id, &self.tank_id, &self.line_id]
                .into_iter()
                .find_map(id_from_value)?,
            volume: optional_number(&self.volume),
            level_mm: optional_number(&self.level_mm),
            temperature_c: optional_number(&self.temperature_c),
            specific_gravity: optional_number(&self.specific_gravity),
            water_cm: optional_number(&self.water_cm),
            density: optional_number(&self.density),
            flow_rate: optional_number(&self.flow_rate),
            status: match &self.status {
                Value::String(s) => VerificationStatus::parse(s),
                _ => VerificationStatus::Unknown,
            },
        })
    }
}

impl Reading {
    pub fn value(&self, field: ReadingField) -> Option<f64> {
        // ---
        match field {
            ReadingField::Volume => self.volume,
            ReadingField::LevelMm => self.level_mm,
            ReadingField::TemperatureC => self.temperature_c,
            ReadingField::SpecificGravity => self.specific_gravity,
            ReadingField::WaterCm => self.water_cm,
            ReadingField::Density => self.density,
            ReadingField::FlowRate => self.flow_rate,
        }
    }
}

/// Validate a batch, logging (at debug) and skipping anything unusable.
pub fn validate_readings(items: &[Value]) -> Vec<Reading> {
    // ---
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let validated = serde_json::from_value::<RawReading>(item.clone())
                .ok()
                .and_then(|raw| raw.to_validated());
            if validated.is_none() {
                tracing::debug!(
                    "Skipping reading {}: missing id, entity or timestamp - Raw item: {}",
                    i,
                    item
                );
            }
            validated
        })
        .collect()
}

// --- entities

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tank {
    // ---
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "loose_number")]
    pub capacity: f64,
    #[serde(default, deserialize_with = "loose_enum")]
    pub status: TankStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "loose_optional_id")]
    pub station_id: Option<String>,
}

/// A fuel delivery into a tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawShipment")]
pub struct Shipment {
    // ---
    pub id: String,
    pub reference: String,
    pub supplier: Option<String>,
    pub product: Option<String>,
    pub date: DateTime<Utc>,
    pub litres: f64,
    pub status: VerificationStatus,
    pub tank_id: Option<String>,
}

/// Wire shape of a shipment. `deliveryDate` and `volume` are older
/// spellings that some backends still send next to the current ones.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShipment {
    #[serde(deserialize_with = "loose_id")]
    id: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    supplier: Option<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    date: Value,
    #[serde(default)]
    delivery_date: Value,
    #[serde(default)]
    litres: Value,
    #[serde(default)]
    volume: Value,
    #[serde(default, deserialize_with = "loose_enum")]
    status: VerificationStatus,
    #[serde(default, deserialize_with = "loose_optional_id")]
    tank_id: Option<String>,
}

impl TryFrom<RawShipment> for Shipment {
    type Error = String;

    fn try_from(raw: RawShipment) -> Result<Self, Self::Error> {
        // ---
        Ok(Self {
            date: first_timestamp(&[&raw.date, &raw.delivery_date])
                .ok_or_else(|| format!("shipment {} has no valid date", raw.id))?,
            litres: first_number(&[&raw.litres, &raw.volume]),
            id: raw.id,
            reference: raw.reference,
            supplier: raw.supplier,
            product: raw.product,
            status: raw.status,
            tank_id: raw.tank_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAlert")]
pub struct Alert {
    // ---
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub tank_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlert {
    #[serde(deserialize_with = "loose_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "loose_enum")]
    severity: AlertSeverity,
    #[serde(default)]
    created_at: Value,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    acknowledged: bool,
    #[serde(default, deserialize_with = "loose_optional_id")]
    tank_id: Option<String>,
}

impl TryFrom<RawAlert> for Alert {
    type Error = String;

    fn try_from(raw: RawAlert) -> Result<Self, Self::Error> {
        // ---
        Ok(Self {
            created_at: first_timestamp(&[&raw.created_at, &raw.timestamp])
                .ok_or_else(|| format!("alert {} has no valid timestamp", raw.id))?,
            id: raw.id,
            title: raw.title,
            message: raw.message,
            severity: raw.severity,
            acknowledged: raw.acknowledged,
            tank_id: raw.tank_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMaintenanceTask")]
pub struct MaintenanceTask {
    // ---
    pub id: String,
    pub title: String,
    pub tank_id: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub assignee: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMaintenanceTask {
    #[serde(deserialize_with = "loose_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "loose_optional_id")]
    tank_id: Option<String>,
    #[serde(default)]
    due_date: Value,
    #[serde(default)]
    scheduled_date: Value,
    #[serde(default, deserialize_with = "loose_enum")]
    status: TaskStatus,
    #[serde(default)]
    assignee: Option<String>,
}

impl TryFrom<RawMaintenanceTask> for MaintenanceTask {
    type Error = String;

    fn try_from(raw: RawMaintenanceTask) -> Result<Self, Self::Error> {
        // ---
        Ok(Self {
            due_date: first_timestamp(&[&raw.due_date, &raw.scheduled_date])
                .ok_or_else(|| format!("task {} has no valid due date", raw.id))?,
            id: raw.id,
            title: raw.title,
            tank_id: raw.tank_id,
            status: raw.status,
            assignee: raw.assignee,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    // ---
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAuditEntry")]
pub struct AuditEntry {
    // ---
    pub id: String,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuditEntry {
    #[serde(deserialize_with = "loose_id")]
    id: String,
    #[serde(default)]
    actor: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    entity: String,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    created_at: Value,
}

impl TryFrom<RawAuditEntry> for AuditEntry {
    type Error = String;

    fn try_from(raw: RawAuditEntry) -> Result<Self, Self::Error> {
        // ---
        Ok(Self {
            timestamp: first_timestamp(&[&raw.timestamp, &raw.created_at])
                .ok_or_else(|| format!("audit entry {} has no valid timestamp", raw.id))?,
            id: raw.id,
            actor: raw.actor,
            action: raw.action,
            entity: raw.entity,
        })
    }
}

/// `GET /api/tankage` envelope. Readings stay raw until validated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankageResponse {
    // ---
    #[serde(default)]
    pub tanks: Vec<Value>,
    #[serde(default)]
    pub tankage_data: Vec<Value>,
}

/// Decode each item on its own so one bad record does not sink the batch.
pub fn decode_items<T: serde::de::DeserializeOwned>(items: &[Value]) -> Vec<T> {
    // ---
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("Failed to parse item {}: {} - Raw item: {}", i, e, item);
                None
            }
        })
        .collect()
}

// --- list transform hooks

fn text(s: &str) -> Option<FieldValue<'_>> {
    Some(FieldValue::Text(s))
}

fn opt_text(s: &Option<String>) -> Option<FieldValue<'_>> {
    s.as_deref().map(FieldValue::Text)
}

fn number(n: f64) -> Option<FieldValue<'static>> {
    Some(FieldValue::Number(n))
}

fn opt_number(n: Option<f64>) -> Option<FieldValue<'static>> {
    n.map(FieldValue::Number)
}

fn date(d: DateTime<Utc>) -> Option<FieldValue<'static>> {
    Some(FieldValue::Date(d))
}

impl Record for Reading {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "timestamp" | "date" => date(self.timestamp),
            "entityId" => text(&self.entity_id),
            "status" => text(self.status.as_str()),
            other => opt_number(ReadingField::parse(other).and_then(|f| self.value(f))),
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["id", "entityId", "status"]
    }

    fn date_field() -> &'static str {
        "timestamp"
    }
}

impl Record for Tank {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "name" => text(&self.name),
            "capacity" => number(self.capacity),
            "status" => text(self.status.as_str()),
            "location" => opt_text(&self.location),
            "stationId" => opt_text(&self.station_id),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["id", "name", "location"]
    }

    fn date_field() -> &'static str {
        ""
    }
}

impl Record for Shipment {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "reference" => text(&self.reference),
            "supplier" => opt_text(&self.supplier),
            "product" => opt_text(&self.product),
            "date" => date(self.date),
            "litres" | "volume" => number(self.litres),
            "status" => text(self.status.as_str()),
            "tankId" => opt_text(&self.tank_id),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["reference", "supplier", "product", "tankId"]
    }

    fn date_field() -> &'static str {
        "date"
    }
}

impl Record for Alert {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "title" => text(&self.title),
            "message" => text(&self.message),
            "severity" => text(self.severity.as_str()),
            "createdAt" | "date" => date(self.created_at),
            "acknowledged" => text(if self.acknowledged { "true" } else { "false" }),
            "tankId" => opt_text(&self.tank_id),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["title", "message", "tankId"]
    }

    fn date_field() -> &'static str {
        "createdAt"
    }
}

impl Record for MaintenanceTask {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "title" => text(&self.title),
            "tankId" => opt_text(&self.tank_id),
            "dueDate" | "date" => date(self.due_date),
            "status" => text(self.status.as_str()),
            "assignee" => opt_text(&self.assignee),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["title", "tankId", "assignee"]
    }

    fn date_field() -> &'static str {
        "dueDate"
    }
}

impl Record for User {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "name" => text(&self.name),
            "email" => text(&self.email),
            "role" => text(&self.role),
            "status" => text(if self.active { "active" } else { "inactive" }),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["name", "email", "role"]
    }

    fn date_field() -> &'static str {
        ""
    }
}

impl Record for AuditEntry {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        // ---
        match name {
            "id" => text(&self.id),
            "actor" => text(&self.actor),
            "action" => text(&self.action),
            "entity" => text(&self.entity),
            "timestamp" | "date" => date(self.timestamp),
            _ => None,
        }
    }

    fn search_fields() -> &'static [&'static str] {
        &["actor", "action", "entity"]
    }

    fn date_field() -> &'static str {
        "timestamp"
    }
}
