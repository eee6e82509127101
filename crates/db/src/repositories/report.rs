//! Report repository and search builder.

use std::sync::Arc;

use crate::entities::{
    Report, report,
    report::{ReportCategory, ReportStatus},
    report_comment,
};
use chrono::{DateTime, FixedOffset, Utc};
use samvad_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
    sea_query::{Alias, Expr, Func, FunctionCall, Query, SimpleExpr},
};
use serde::Serialize;

/// Mean Earth radius used for great-circle distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Largest row offset a query can bind.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Which reports a caller is allowed to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportScope {
    /// Only reports with `is_public = true`.
    PublicOnly,
    /// Reports owned by the given citizen, any visibility.
    OwnedBy(String),
    /// Reports assigned to the given staff member.
    AssignedTo(String),
    /// Everything.
    All,
}

/// Radius search around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub longitude: f64,
    pub latitude: f64,
    /// Radius in meters.
    pub radius: f64,
}

/// Sortable report columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Priority,
    Status,
    Category,
    Title,
}

impl SortField {
    const fn column(self) -> report::Column {
        match self {
            Self::CreatedAt => report::Column::CreatedAt,
            Self::UpdatedAt => report::Column::UpdatedAt,
            Self::Priority => report::Column::Priority,
            Self::Status => report::Column::Status,
            Self::Category => report::Column::Category,
            Self::Title => report::Column::Title,
        }
    }
}

/// Explicit ordering requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

/// A fully parsed report search.
///
/// Every criterion is combined with AND. The result is a pure function of
/// the criteria and the stored rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSearch {
    pub scope: ReportScope,
    pub category: Option<ReportCategory>,
    pub status: Option<ReportStatus>,
    pub priority: Option<i32>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<FixedOffset>>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<FixedOffset>>,
    pub near: Option<GeoFilter>,
    /// Case-insensitive substring over title, description, category and report number.
    pub text: Option<String>,
    /// `None` means default ordering (distance for nearby searches, newest first otherwise).
    pub sort: Option<SortSpec>,
    /// 1-based page number.
    pub page: u64,
    pub limit: u64,
}

impl ReportSearch {
    /// A search returning the first page of the given scope, newest first.
    #[must_use]
    pub const fn new(scope: ReportScope) -> Self {
        Self {
            scope,
            category: None,
            status: None,
            priority: None,
            created_from: None,
            created_to: None,
            near: None,
            text: None,
            sort: None,
            page: 1,
            limit: 10,
        }
    }

    /// Number of rows skipped before the requested page, at most [`MAX_OFFSET`].
    #[must_use]
    pub const fn offset(&self) -> u64 {
        let offset = self.page.saturating_sub(1).saturating_mul(self.limit);
        if offset > MAX_OFFSET { MAX_OFFSET } else { offset }
    }

    /// The WHERE clause of this search.
    #[must_use]
    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        cond = match &self.scope {
            ReportScope::PublicOnly => cond.add(report::Column::IsPublic.eq(true)),
            ReportScope::OwnedBy(citizen_id) => {
                cond.add(report::Column::CitizenId.eq(citizen_id.as_str()))
            }
            ReportScope::AssignedTo(staff_id) => {
                cond.add(report::Column::AssignedStaffId.eq(staff_id.as_str()))
            }
            ReportScope::All => cond,
        };

        if let Some(category) = self.category {
            cond = cond.add(report::Column::Category.eq(category));
        }
        if let Some(status) = self.status {
            cond = cond.add(report::Column::Status.eq(status));
        }
        if let Some(priority) = self.priority {
            cond = cond.add(report::Column::Priority.eq(priority));
        }
        if let Some(from) = self.created_from {
            cond = cond.add(report::Column::CreatedAt.gte(from));
        }
        if let Some(to) = self.created_to {
            cond = cond.add(report::Column::CreatedAt.lte(to));
        }
        if let Some(geo) = self.near {
            cond = cond.add(Expr::expr(distance_expr(geo)).lte(geo.radius));
        }
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(&text.trim().to_lowercase()));
            let mut any = Condition::any();
            for column in [
                report::Column::Title,
                report::Column::Description,
                report::Column::Category,
                report::Column::ReportNumber,
            ] {
                any = any.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()));
            }
            cond = cond.add(any);
        }

        cond
    }

    /// Filtered and ordered select, without pagination.
    #[must_use]
    pub fn select(&self) -> Select<report::Entity> {
        let query = Report::find().filter(self.condition());

        match (self.sort, self.near) {
            (None, Some(geo)) => query
                .order_by(distance_expr(geo), Order::Asc)
                .order_by_asc(report::Column::Id),
            (sort, _) => {
                let sort = sort.unwrap_or_default();
                let order = if sort.descending {
                    Order::Desc
                } else {
                    Order::Asc
                };
                query
                    .order_by(sort.field.column(), order.clone())
                    .order_by(report::Column::Id, order)
            }
        }
    }
}

/// Great-circle distance in meters from `geo` to the report's location (haversine).
fn distance_expr(geo: GeoFilter) -> SimpleExpr {
    let lat = || Expr::col((Report, report::Column::Latitude));
    let lon = Expr::col((Report, report::Column::Longitude));

    let d_lat = half_angle_sin_squared(radians(lat().sub(geo.latitude)));
    let d_lon = half_angle_sin_squared(radians(lon.sub(geo.longitude)));
    let cos_product = SimpleExpr::from(call("COS", [radians(Expr::val(geo.latitude))]))
        .mul(call("COS", [radians(lat())]));

    let sqrt = call("SQRT", [d_lat.add(cos_product.mul(d_lon))]);
    let clamped = call("LEAST", [Expr::val(1.0_f64).into(), sqrt.into()]);
    Expr::val(2.0 * EARTH_RADIUS_METERS).mul(call("ASIN", [clamped.into()]))
}

fn call<const N: usize>(name: &'static str, args: [SimpleExpr; N]) -> FunctionCall {
    Func::cust(Alias::new(name)).args(args)
}

fn radians(expr: impl Into<SimpleExpr>) -> SimpleExpr {
    call("RADIANS", [expr.into()]).into()
}

/// `SIN(angle / 2)^2`
fn half_angle_sin_squared(angle: SimpleExpr) -> SimpleExpr {
    let sin = call("SIN", [angle.div(2.0_f64)]);
    call("POWER", [sin.into(), Expr::val(2.0_f64).into()]).into()
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Number of reports in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct StatusCount {
    pub status: ReportStatus,
    pub count: i64,
}

/// Per category and status aggregate for the analytics view.
#[derive(Debug, Clone, PartialEq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatusStats {
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub count: i64,
    pub avg_priority: f64,
}

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new report.
    pub async fn create(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a report by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<report::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))
    }

    /// Find the report a citizen created with the given idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        citizen_id: &str,
        key: &str,
    ) -> AppResult<Option<report::Model>> {
        Report::find()
            .filter(report::Column::CitizenId.eq(citizen_id))
            .filter(report::Column::IdempotencyKey.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Run a search, returning one page of reports and the total match count.
    pub async fn search(&self, search: &ReportSearch) -> AppResult<(Vec<report::Model>, u64)> {
        let total = Report::find()
            .filter(search.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let reports = search
            .select()
            .offset(search.offset())
            .limit(search.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((reports, total))
    }

    /// Persist `updated` if the stored row still has `updated.version`.
    ///
    /// Writes every column, bumps the version and returns the stored state.
    /// A concurrent writer that got there first yields [`AppError::Conflict`].
    pub async fn update_versioned(&self, updated: report::Model) -> AppResult<report::Model> {
        let expected_version = updated.version;
        let mut stored = updated;
        stored.version = expected_version + 1;
        stored.updated_at = Utc::now().into();

        let mut active: report::ActiveModel = stored.clone().into();
        active = active.reset_all();
        active.id = sea_orm::ActiveValue::NotSet;

        let result = Report::update_many()
            .set(active)
            .filter(report::Column::Id.eq(stored.id.as_str()))
            .filter(report::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(
                "Report was modified by another request, reload and retry".to_string(),
            ));
        }

        Ok(stored)
    }

    /// Delete a report. Comments are removed by the foreign key cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Report::delete_many()
            .filter(report::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::ReportNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Count reports assigned to a staff member, grouped by status.
    pub async fn count_by_status_for_staff(
        &self,
        staff_id: &str,
    ) -> AppResult<Vec<StatusCount>> {
        Report::find()
            .select_only()
            .column(report::Column::Status)
            .column_as(report::Column::Id.count(), "count")
            .filter(report::Column::AssignedStaffId.eq(staff_id))
            .group_by(report::Column::Status)
            .into_model::<StatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Newest reports assigned to a staff member.
    pub async fn find_latest_assigned(
        &self,
        staff_id: &str,
        limit: u64,
    ) -> AppResult<Vec<report::Model>> {
        Report::find()
            .filter(report::Column::AssignedStaffId.eq(staff_id))
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recently updated reports a staff member is assigned to or has commented on.
    pub async fn find_recent_activity(
        &self,
        staff_id: &str,
        limit: u64,
    ) -> AppResult<Vec<report::Model>> {
        let commented = Query::select()
            .column(report_comment::Column::ReportId)
            .from(report_comment::Entity)
            .and_where(report_comment::Column::StaffId.eq(staff_id))
            .to_owned();

        Report::find()
            .filter(
                Condition::any()
                    .add(report::Column::AssignedStaffId.eq(staff_id))
                    .add(report::Column::Id.in_subquery(commented)),
            )
            .order_by_desc(report::Column::UpdatedAt)
            .order_by_desc(report::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count and average priority per (category, status) for reports created in a window.
    pub async fn category_status_stats(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> AppResult<Vec<CategoryStatusStats>> {
        Report::find()
            .select_only()
            .column(report::Column::Category)
            .column(report::Column::Status)
            .column_as(report::Column::Id.count(), "count")
            .column_as(
                Expr::cust("CAST(AVG(\"report\".\"priority\") AS DOUBLE PRECISION)"),
                "avg_priority",
            )
            .filter(report::Column::CreatedAt.gte(from))
            .filter(report::Column::CreatedAt.lte(to))
            .group_by(report::Column::Category)
            .group_by(report::Column::Status)
            .order_by(Expr::col(Alias::new("count")), Order::Desc)
            .order_by_asc(report::Column::Category)
            .into_model::<CategoryStatusStats>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait, Value};

    fn sql(search: &ReportSearch) -> String {
        search
            .select()
            .build(DatabaseBackend::Postgres)
            .to_string()
    }

    fn create_test_report(id: &str, citizen_id: &str) -> report::Model {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap().into();
        report::Model {
            id: id.to_string(),
            report_number: "RPT123456789".to_string(),
            title: "Broken streetlight".to_string(),
            description: "The light on 5th street is out".to_string(),
            category: ReportCategory::Light,
            priority: 3,
            status: ReportStatus::Submitted,
            longitude: 77.59,
            latitude: 12.97,
            address: Some("12 MG Road".to_string()),
            photos: report::Photos::default(),
            citizen_id: citizen_id.to_string(),
            assigned_staff_id: None,
            assigned_at: None,
            resolved_at: None,
            resolution_details: None,
            estimated_resolution_date: None,
            actual_resolution_date: None,
            feedback_rating: None,
            feedback_comment: None,
            feedback_submitted_at: None,
            is_public: true,
            version: 1,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_public_scope_filters_visibility() {
        let search = ReportSearch::new(ReportScope::PublicOnly);
        let sql = sql(&search);
        assert!(sql.contains(r#""report"."is_public" = TRUE"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "report"."created_at" DESC, "report"."id" DESC"#));
    }

    #[test]
    fn test_owned_scope_filters_citizen() {
        let search = ReportSearch::new(ReportScope::OwnedBy("c1".to_string()));
        let sql = sql(&search);
        assert!(sql.contains(r#""report"."citizen_id" = 'c1'"#), "{sql}");
        assert!(!sql.contains("is_public"));
    }

    #[test]
    fn test_all_scope_has_no_ownership_filter() {
        let sql = sql(&ReportSearch::new(ReportScope::All));
        assert!(!sql.contains("is_public"), "{sql}");
        assert!(!sql.contains(r#""citizen_id" ="#), "{sql}");
        assert!(!sql.contains(r#""assigned_staff_id" ="#), "{sql}");
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let mut search = ReportSearch::new(ReportScope::AssignedTo("s1".to_string()));
        search.category = Some(ReportCategory::Pothole);
        search.status = Some(ReportStatus::InProgress);
        search.priority = Some(4);
        let sql = sql(&search);
        assert!(sql.contains(r#""report"."assigned_staff_id" = 's1'"#), "{sql}");
        assert!(sql.contains(r#""report"."category" = 'Pothole'"#), "{sql}");
        assert!(sql.contains(r#""report"."status" = 'In Progress'"#), "{sql}");
        assert!(sql.contains(r#""report"."priority" = 4"#), "{sql}");
        assert_eq!(sql.matches(" AND ").count(), 3, "{sql}");
    }

    #[test]
    fn test_nearby_without_sort_orders_by_distance() {
        let mut search = ReportSearch::new(ReportScope::All);
        search.near = Some(GeoFilter {
            longitude: 77.5,
            latitude: 12.9,
            radius: 1000.0,
        });
        let sql = sql(&search);
        assert!(sql.contains("ASIN"), "{sql}");
        assert!(sql.contains("<= 1000"), "{sql}");
        assert!(sql.contains(r#"ASC, "report"."id" ASC"#), "{sql}");
        assert!(!sql.contains(r#""report"."created_at" DESC"#), "{sql}");
    }

    #[test]
    fn test_nearby_search_binds_point_coordinates() {
        let mut search = ReportSearch::new(ReportScope::All);
        search.near = Some(GeoFilter {
            longitude: 77.5946,
            latitude: 12.9716,
            radius: 1000.0,
        });
        let stmt = search.select().build(DatabaseBackend::Postgres);
        let values = stmt.values.unwrap().0;

        let count = |v: f64| values.iter().filter(|x| **x == Value::Double(Some(v))).count();
        // WHERE and ORDER BY each carry the distance expression
        assert_eq!(count(12.9716), 4, "{values:?}");
        assert_eq!(count(77.5946), 2, "{values:?}");
        assert_eq!(count(1000.0), 1, "{values:?}");
        assert!(!stmt.sql.contains('?'), "{}", stmt.sql);
        assert!(stmt.sql.contains(r#"RADIANS("report"."latitude" - $"#), "{}", stmt.sql);
    }

    #[test]
    fn test_nearby_with_explicit_sort_uses_it() {
        let mut search = ReportSearch::new(ReportScope::All);
        search.near = Some(GeoFilter {
            longitude: 77.5,
            latitude: 12.9,
            radius: 1000.0,
        });
        search.sort = Some(SortSpec {
            field: SortField::Priority,
            descending: false,
        });
        let sql = sql(&search);
        assert!(
            sql.contains(r#"ORDER BY "report"."priority" ASC, "report"."id" ASC"#),
            "{sql}"
        );
    }

    #[test]
    fn test_text_search_is_escaped_and_lowercased() {
        let mut search = ReportSearch::new(ReportScope::All);
        search.text = Some("  100% Dark ".to_string());
        let sql = sql(&search);
        assert!(sql.contains(r"%100\\% dark%") || sql.contains(r"%100\% dark%"), "{sql}");
        assert!(sql.contains("LOWER"), "{sql}");
        assert_eq!(sql.matches(" OR ").count(), 3, "{sql}");
    }

    #[test]
    fn test_blank_text_is_ignored() {
        let mut search = ReportSearch::new(ReportScope::All);
        search.text = Some("   ".to_string());
        assert!(!sql(&search).contains("LIKE"));
    }

    #[test]
    fn test_offset() {
        let mut search = ReportSearch::new(ReportScope::All);
        assert_eq!(search.offset(), 0);
        search.page = 3;
        search.limit = 20;
        assert_eq!(search.offset(), 40);
        search.page = u64::MAX;
        assert_eq!(search.offset(), MAX_OFFSET);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        match repo.get_by_id("missing").await {
            Err(AppError::ReportNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected ReportNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_versioned_bumps_version() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let mut report = create_test_report("r1", "c1");
        report.status = ReportStatus::Assigned;

        let stored = repo.update_versioned(report).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status, ReportStatus::Assigned);
    }

    #[tokio::test]
    async fn test_update_versioned_lost_race_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo.update_versioned(create_test_report("r1", "c1")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_report() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        assert!(matches!(
            repo.delete("gone").await,
            Err(AppError::ReportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_returns_page_and_total() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(12)),
                }]])
                .append_query_results([[
                    create_test_report("r1", "c1"),
                    create_test_report("r2", "c2"),
                ]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let mut search = ReportSearch::new(ReportScope::PublicOnly);
        search.page = 2;
        search.limit = 10;
        let (reports, total) = repo.search(&search).await.unwrap();
        assert_eq!(total, 12);
        assert_eq!(reports.len(), 2);
    }
}
