//! Parsing of raw listing criteria into a [`ReportSearch`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use samvad_common::{AppError, AppResult, FieldError};
use samvad_db::{
    entities::report::{ReportCategory, ReportStatus},
    repositories::{GeoFilter, MAX_OFFSET, ReportSearch, SortField, SortSpec},
};
use serde::Deserialize;

use crate::services::access::{self, Actor};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;
pub const MAX_RADIUS_METERS: f64 = 100_000.0;
pub const MAX_SEARCH_LEN: usize = 200;

/// Listing criteria exactly as received in the query string.
///
/// Everything is kept as text so that malformed values are reported per
/// field instead of failing the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
    pub radius: Option<String>,
    pub mine: Option<String>,
    pub assigned: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn finish<T>(self, value: T) -> AppResult<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(AppError::ValidationFailed(self.0))
        }
    }
}

/// Treats absent and blank parameters alike.
fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// A date bound: RFC 3339 timestamp or a bare `YYYY-MM-DD`.
///
/// A bare end date covers the whole day.
pub(crate) fn parse_date_bound(value: &str, end_of_day: bool) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)).fixed_offset())
}

fn parse_sort(value: &str) -> Option<SortSpec> {
    let (field, direction) = value.split_once(':').unwrap_or((value, "desc"));
    let field = match field {
        "createdAt" => SortField::CreatedAt,
        "updatedAt" => SortField::UpdatedAt,
        "priority" => SortField::Priority,
        "status" => SortField::Status,
        "category" => SortField::Category,
        "title" => SortField::Title,
        _ => return None,
    };
    let descending = match direction.to_ascii_lowercase().as_str() {
        "asc" => false,
        "desc" => true,
        _ => return None,
    };
    Some(SortSpec { field, descending })
}

fn parse_coordinate(errors: &mut Errors, field: &str, value: &str, bound: f64) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && (-bound..=bound).contains(&v) => Some(v),
        _ => {
            errors.push(field, format!("{field} must be a number between -{bound} and {bound}"));
            None
        }
    }
}

/// Turn raw criteria into a search for the given viewer.
///
/// The ownership scope comes from the access policy; unauthenticated callers
/// are limited to public reports whatever else they ask for.
pub fn parse(viewer: Option<&Actor>, raw: &ReportQuery) -> AppResult<ReportSearch> {
    let mut errors = Errors::default();

    let mine = present(raw.mine.as_ref()).and_then(|v| {
        let parsed = parse_bool(v);
        if parsed.is_none() {
            errors.push("mine", "mine must be true or false");
        }
        parsed
    });
    let assigned = present(raw.assigned.as_ref()).and_then(|v| {
        let parsed = parse_bool(v);
        if parsed.is_none() {
            errors.push("assigned", "assigned must be true or false");
        }
        parsed
    });

    let mut search = ReportSearch::new(access::read_scope(viewer, mine, assigned));

    search.page = match present(raw.page.as_ref()) {
        None => DEFAULT_PAGE,
        Some(v) => match v.parse::<u64>() {
            Ok(page) if page >= 1 => page,
            _ => {
                errors.push("page", "page must be a positive integer");
                DEFAULT_PAGE
            }
        },
    };

    search.limit = match present(raw.limit.as_ref()) {
        None => DEFAULT_LIMIT,
        Some(v) => match v.parse::<u64>() {
            Ok(limit) if limit >= 1 => limit.min(MAX_LIMIT),
            _ => {
                errors.push("limit", "limit must be a positive integer");
                DEFAULT_LIMIT
            }
        },
    };

    let skipped = (search.page - 1).checked_mul(search.limit);
    if skipped.is_none_or(|n| n > MAX_OFFSET) {
        errors.push("page", "page is too large");
        search.page = DEFAULT_PAGE;
    }

    if let Some(v) = present(raw.category.as_ref()) {
        match v.parse::<ReportCategory>() {
            Ok(category) => search.category = Some(category),
            Err(message) => errors.push("category", message),
        }
    }

    if let Some(v) = present(raw.status.as_ref()) {
        match v.parse::<ReportStatus>() {
            Ok(status) => search.status = Some(status),
            Err(message) => errors.push("status", message),
        }
    }

    if let Some(v) = present(raw.priority.as_ref()) {
        match v.parse::<i32>() {
            Ok(priority) if (1..=5).contains(&priority) => search.priority = Some(priority),
            _ => errors.push("priority", "priority must be an integer between 1 and 5"),
        }
    }

    if let Some(v) = present(raw.start_date.as_ref()) {
        search.created_from = parse_date_bound(v, false);
        if search.created_from.is_none() {
            errors.push("startDate", "startDate must be an ISO 8601 date");
        }
    }
    if let Some(v) = present(raw.end_date.as_ref()) {
        search.created_to = parse_date_bound(v, true);
        if search.created_to.is_none() {
            errors.push("endDate", "endDate must be an ISO 8601 date");
        }
    }
    if let (Some(from), Some(to)) = (search.created_from, search.created_to) {
        if from > to {
            errors.push("endDate", "endDate must not be before startDate");
        }
    }

    let longitude = present(raw.longitude.as_ref());
    let latitude = present(raw.latitude.as_ref());
    let radius = present(raw.radius.as_ref());
    match (longitude, latitude, radius) {
        (None, None, None) => {}
        (Some(lon), Some(lat), Some(rad)) => {
            let lon = parse_coordinate(&mut errors, "longitude", lon, 180.0);
            let lat = parse_coordinate(&mut errors, "latitude", lat, 90.0);
            let rad = match rad.parse::<f64>() {
                Ok(r) if r.is_finite() && (1.0..=MAX_RADIUS_METERS).contains(&r) => Some(r),
                _ => {
                    errors.push(
                        "radius",
                        format!("radius must be between 1 and {MAX_RADIUS_METERS} meters"),
                    );
                    None
                }
            };
            if let (Some(longitude), Some(latitude), Some(radius)) = (lon, lat, rad) {
                search.near = Some(GeoFilter {
                    longitude,
                    latitude,
                    radius,
                });
            }
        }
        _ => errors.push(
            "radius",
            "longitude, latitude and radius must be given together",
        ),
    }

    if let Some(v) = present(raw.search.as_ref()) {
        if v.chars().count() > MAX_SEARCH_LEN {
            errors.push(
                "search",
                format!("search cannot exceed {MAX_SEARCH_LEN} characters"),
            );
        } else {
            search.text = Some(v.to_string());
        }
    }

    if let Some(v) = present(raw.sort_by.as_ref()) {
        match parse_sort(v) {
            Some(sort) => search.sort = Some(sort),
            None => errors.push(
                "sortBy",
                "sortBy must be one of createdAt, updatedAt, priority, status, category, title \
                 optionally followed by :asc or :desc",
            ),
        }
    }

    errors.finish(search)
}

/// Number of pages needed for `total` rows.
#[must_use]
pub const fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        0
    } else {
        total.div_ceil(limit)
    }
}
