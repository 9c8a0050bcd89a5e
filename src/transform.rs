//! Filter → sort → paginate over in-memory record sets.
//!
//! [`transform`] never mutates its input and keeps no state between calls:
//! the same records and the same [`ListQuery`] always produce the same
//! [`Page`].

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::parse_timestamp;

// ---

/// A field value exposed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Date(DateTime<Utc>),
}

/// Something the pipeline can filter, sort and page.
pub trait Record {
    /// Identity used to break sort ties.
    fn record_id(&self) -> &str;

    /// Value of a named field, `None` when absent.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Fields searched by a free-text query when none are named.
    fn search_fields() -> &'static [&'static str];

    /// Field used by date range filters; empty when the record has none.
    fn date_field() -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Inclusive bound for range filters. A bound only matches fields of the same
/// kind; a number bound never matches a date field.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Number(f64),
    Date(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Text compares case-insensitively; numbers compare exactly.
    Equals { field: String, value: String },
    /// Inclusive range; either side may be open.
    Range {
        field: String,
        min: Option<Bound>,
        max: Option<Bound>,
    },
    /// Case-insensitive substring match on any of `fields`.
    Search { query: String, fields: Vec<String> },
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Search over the record type's default search fields.
    pub fn search<T: Record>(query: impl Into<String>) -> Self {
        Filter::Search {
            query: query.into(),
            fields: T::search_fields().iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Inclusive date window over the record type's date field.
    pub fn date_range<T: Record>(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Filter::Range {
            field: T::date_field().to_string(),
            min: start.map(Bound::Date),
            max: end.map(Bound::Date),
        }
    }

    fn matches<R: Record>(&self, record: &R) -> bool {
        // ---
        match self {
            Filter::Equals { field, value } => match record.field(field) {
                Some(FieldValue::Text(t)) => t.trim().to_lowercase() == value.trim().to_lowercase(),
                Some(FieldValue::Number(n)) => value.trim().parse::<f64>().is_ok_and(|v| v == n),
                Some(FieldValue::Date(d)) => {
                    let wanted = serde_json::Value::String(value.clone());
                    parse_timestamp(&wanted).is_some_and(|v| v == d)
                }
                None => false,
            },
            Filter::Range { field, min, max } => {
                let Some(value) = record.field(field) else {
                    return false;
                };
                let within = |bound: &Option<Bound>, outside: Ordering| match bound {
                    Some(b) => compare_to_bound(&value, b).is_some_and(|o| o != outside),
                    None => true,
                };
                let above = within(min, Ordering::Less);
                let below = within(max, Ordering::Greater);
                above && below
            }
            Filter::Search { query, fields } => {
                let needle = query.trim().to_lowercase();
                if needle.is_empty() {
                    return true;
                }
                fields.iter().any(|f| match record.field(f) {
                    Some(FieldValue::Text(t)) => t.to_lowercase().contains(&needle),
                    Some(FieldValue::Number(n)) => n.to_string().contains(&needle),
                    _ => false,
                })
            }
        }
    }
}

fn compare_to_bound(value: &FieldValue<'_>, bound: &Bound) -> Option<Ordering> {
    // ---
    match (value, bound) {
        (FieldValue::Number(n), Bound::Number(b)) => n.partial_cmp(b),
        (FieldValue::Date(d), Bound::Date(b)) => Some(d.cmp(b)),
        _ => None,
    }
}

/// Page sizes offered to the dashboard user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    Twenty,
    TwentyFive,
    Fifty,
    Hundred,
}

impl PageSize {
    pub const ALL: [PageSize; 6] = [
        PageSize::Five,
        PageSize::Ten,
        PageSize::Twenty,
        PageSize::TwentyFive,
        PageSize::Fifty,
        PageSize::Hundred,
    ];

    pub fn get(self) -> usize {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::TwentyFive => 25,
            PageSize::Fifty => 50,
            PageSize::Hundred => 100,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = String;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|p| p.get() == n)
            .ok_or_else(|| format!("page size must be one of 5, 10, 20, 25, 50, 100 (got {n})"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Option<SortSpec>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            page: 1,
            page_size: PageSize::default().get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub total_pages: usize,
    /// The page actually returned, after clamping.
    pub page: usize,
    pub page_size: usize,
}

/// Text is compared case-folded, then raw, so "alpha" and "Alpha" sit
/// together but still order deterministically.
fn compare_text(a: &str, b: &str) -> Ordering {
    // ---
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn type_rank(v: &FieldValue<'_>) -> u8 {
    match v {
        FieldValue::Number(_) => 0,
        FieldValue::Date(_) => 1,
        FieldValue::Text(_) => 2,
    }
}

fn compare_values(a: &FieldValue<'_>, b: &FieldValue<'_>) -> Ordering {
    // ---
    match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(y),
        (FieldValue::Date(x), FieldValue::Date(y)) => x.cmp(y),
        (FieldValue::Text(x), FieldValue::Text(y)) => compare_text(x, y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Filter (AND of all filters), sort, then cut one page.
///
/// The sort is total: records with the field missing go last in either
/// direction, ties fall back to `record_id` and then to input position.
/// `page` is clamped into `1..=total_pages`; a `page_size` of 0 counts as 1.
pub fn transform<T: Record + Clone>(records: &[T], query: &ListQuery) -> Page<T> {
    // ---
    let mut selected: Vec<(usize, &T)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| query.filters.iter().all(|f| f.matches(*r)))
        .collect();

    if let Some(sort) = &query.sort {
        selected.sort_by(|(ia, a), (ib, b)| {
            let primary = match (a.field(&sort.field), b.field(&sort.field)) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(&x, &y);
                    match sort.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            primary
                .then_with(|| a.record_id().cmp(b.record_id()))
                .then_with(|| ia.cmp(ib))
        });
    }

    let page_size = query.page_size.max(1);
    let total_count = selected.len();
    let total_pages = total_count.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = selected
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(|(_, r)| r.clone())
        .collect();

    Page {
        items,
        total_count,
        total_pages,
        page,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Shipment, VerificationStatus};
    use chrono::TimeZone;

    /// Twelve deliveries dated Jan 9-20, statuses rotating.
    fn deliveries() -> Vec<Shipment> {
        // ---
        let litres = [
            4200.0, 3100.0, 5600.0, 2900.0, 7800.0, 6100.0, 3300.0, 8800.0, 4700.0, 5100.0, 2500.0,
            9900.0,
        ];
        let statuses = [
            VerificationStatus::Verified,
            VerificationStatus::Pending,
            VerificationStatus::Verified,
            VerificationStatus::Rejected,
            VerificationStatus::Verified,
            VerificationStatus::Verified,
            VerificationStatus::Pending,
            VerificationStatus::Verified,
            VerificationStatus::Verified,
            VerificationStatus::Rejected,
            VerificationStatus::Verified,
            VerificationStatus::Pending,
        ];
        (0..12)
            .map(|i| Shipment {
                id: format!("S-{:02}", i + 1),
                reference: format!("DLV-{:03}", i + 1),
                supplier: Some(if i % 2 == 0 { "Northfuel" } else { "Coastline" }.to_string()),
                product: Some("Diesel".to_string()),
                date: Utc.with_ymd_and_hms(2025, 1, 9 + i as u32, 8, 0, 0).unwrap(),
                litres: litres[i],
                status: statuses[i],
                tank_id: Some("T-01".to_string()),
            })
            .collect()
    }

    fn ids(page: &Page<Shipment>) -> Vec<&str> {
        page.items.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_latest_first_page_of_eight() {
        // ---
        let records = deliveries();
        let query = ListQuery {
            sort: Some(SortSpec::new("date", SortDirection::Desc)),
            page: 1,
            page_size: 8,
            ..ListQuery::default()
        };
        let page = transform(&records, &query);
        assert_eq!(page.items.len(), 8);
        assert_eq!(page.total_count, 12);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].id, "S-12");
        assert_eq!(page.items[7].id, "S-05");

        // Same inputs, same output; input untouched.
        assert_eq!(transform(&records, &query), page);
        assert_eq!(records, deliveries());
    }

    #[test]
    fn test_verified_by_litres_desc_first_five() {
        // ---
        let records = deliveries();
        let query = ListQuery {
            filters: vec![Filter::equals("status", "verified")],
            sort: Some(SortSpec::new("litres", SortDirection::Desc)),
            page: 1,
            page_size: 5,
        };
        let page = transform(&records, &query);

        // Verified: S-01 4200, S-03 5600, S-05 7800, S-06 6100, S-08 8800,
        // S-09 4700, S-11 2500.
        assert_eq!(page.total_count, 7);
        assert_eq!(ids(&page), vec!["S-08", "S-05", "S-06", "S-03", "S-09"]);
        let litres: Vec<f64> = page.items.iter().map(|s| s.litres).collect();
        assert_eq!(litres, vec![8800.0, 7800.0, 6100.0, 5600.0, 4700.0]);
    }

    #[test]
    fn test_out_of_range_page_clamps() {
        // ---
        let records = deliveries();
        let query = ListQuery {
            page: 999,
            page_size: 8,
            sort: Some(SortSpec::new("date", SortDirection::Asc)),
            ..ListQuery::default()
        };
        let page = transform(&records, &query);
        assert_eq!(page.page, 2);
        assert_eq!(ids(&page), vec!["S-09", "S-10", "S-11", "S-12"]);

        let first = transform(&records, &ListQuery { page: 0, ..query });
        assert_eq!(first.page, 1);
    }

    #[test]
    fn test_empty_result_has_one_page() {
        // ---
        let records = deliveries();
        let query = ListQuery {
            filters: vec![Filter::equals("status", "unknown")],
            page: 3,
            ..ListQuery::default()
        };
        let page = transform(&records, &query);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_ties_broken_by_id() {
        // ---
        let mut records = deliveries();
        for r in &mut records {
            r.litres = 1000.0;
        }
        records.reverse();
        let query = ListQuery {
            sort: Some(SortSpec::new("litres", SortDirection::Desc)),
            page_size: 3,
            ..ListQuery::default()
        };
        assert_eq!(ids(&transform(&records, &query)), vec!["S-01", "S-02", "S-03"]);
    }

    #[test]
    fn test_missing_values_sort_last() {
        // ---
        let mut records = deliveries();
        records[0].supplier = None;
        for dir in [SortDirection::Asc, SortDirection::Desc] {
            let query = ListQuery {
                sort: Some(SortSpec::new("supplier", dir)),
                page_size: 100,
                ..ListQuery::default()
            };
            let page = transform(&records, &query);
            assert_eq!(page.items.last().map(|s| s.id.as_str()), Some("S-01"));
        }
    }

    #[test]
    fn test_search_and_range_combine() {
        // ---
        let records = deliveries();
        let query = ListQuery {
            filters: vec![
                Filter::search::<Shipment>("NORTH"),
                Filter::date_range::<Shipment>(
                    Some(Utc.with_ymd_and_hms(2025, 1, 12, 0, 0, 0).unwrap()),
                    Some(Utc.with_ymd_and_hms(2025, 1, 17, 8, 0, 0).unwrap()),
                ),
            ],
            sort: Some(SortSpec::new("date", SortDirection::Asc)),
            page_size: 100,
            ..ListQuery::default()
        };
        // Northfuel is on even indices: S-01, S-03, ... ; window is Jan 12-17.
        assert_eq!(ids(&transform(&records, &query)), vec!["S-05", "S-07", "S-09"]);
    }

    #[test]
    fn test_numeric_equality_and_range() {
        // ---
        let records = deliveries();
        let exact = ListQuery {
            filters: vec![Filter::equals("litres", "8800")],
            ..ListQuery::default()
        };
        assert_eq!(ids(&transform(&records, &exact)), vec!["S-08"]);

        let range = ListQuery {
            filters: vec![Filter::Range {
                field: "litres".into(),
                min: Some(Bound::Number(7000.0)),
                max: None,
            }],
            sort: Some(SortSpec::new("litres", SortDirection::Asc)),
            ..ListQuery::default()
        };
        assert_eq!(ids(&transform(&records, &range)), vec!["S-05", "S-08", "S-12"]);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        // ---
        let mut records = deliveries();
        records.truncate(3);
        records[0].reference = "bravo".into();
        records[1].reference = "Alpha".into();
        records[2].reference = "charlie".into();
        let query = ListQuery {
            sort: Some(SortSpec::new("reference", SortDirection::Asc)),
            ..ListQuery::default()
        };
        assert_eq!(ids(&transform(&records, &query)), vec!["S-02", "S-01", "S-03"]);
    }

    #[test]
    fn test_page_size_choices() {
        // ---
        assert_eq!(PageSize::try_from(25), Ok(PageSize::TwentyFive));
        assert!(PageSize::try_from(8).is_err());
        assert_eq!(PageSize::default().get(), 10);
    }
}
