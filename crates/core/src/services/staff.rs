//! Staff service.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use samvad_common::{AppError, AppResult, IdGenerator, config::LifecycleConfig};
use samvad_db::{
    entities::{
        report::ReportStatus,
        report_comment,
        user::UserRole,
    },
    repositories::{
        CategoryStatusStats, ReportCommentRepository, ReportRepository, StatusCount,
        UserRepository,
    },
};
use sea_orm::{Iterable, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::{
    access::{self, Actor},
    lifecycle::{self, StatusChange},
    query,
    report::{ReportService, ReportView},
};

const DASHBOARD_ASSIGNED: u64 = 10;
const DASHBOARD_RECENT: u64 = 5;
const ANALYTICS_DEFAULT_DAYS: i64 = 30;

/// Input for assigning a report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignInput {
    /// Staff member to assign; the caller when absent.
    pub staff_id: Option<String>,
}

/// Input for changing a report's status.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusInput {
    pub status: ReportStatus,

    #[validate(length(max = 1000, message = "Resolution details cannot exceed 1000 characters"))]
    pub resolution_details: Option<String>,

    pub estimated_resolution_date: Option<DateTime<FixedOffset>>,
}

/// Input for adding a staff comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub comment: String,
}

/// Analytics window as received in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// The staff dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Reports assigned to the caller per status, zero counts included.
    pub stats: Vec<StatusCount>,
    pub total_assigned: i64,
    pub assigned_reports: Vec<ReportView>,
    pub recent_activity: Vec<ReportView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
    pub stats: Vec<CategoryStatusStats>,
}

/// Staff service for triage and resolution work.
#[derive(Clone)]
pub struct StaffService {
    reports: ReportService,
    report_repo: ReportRepository,
    comment_repo: ReportCommentRepository,
    user_repo: UserRepository,
    lifecycle: LifecycleConfig,
    id_gen: IdGenerator,
}

impl StaffService {
    /// Create a new staff service.
    #[must_use]
    pub const fn new(
        reports: ReportService,
        report_repo: ReportRepository,
        comment_repo: ReportCommentRepository,
        user_repo: UserRepository,
        lifecycle: LifecycleConfig,
    ) -> Self {
        Self {
            reports,
            report_repo,
            comment_repo,
            user_repo,
            lifecycle,
            id_gen: IdGenerator::new(),
        }
    }

    /// Assign a report to a staff member, or to the caller.
    pub async fn assign(&self, actor: &Actor, report_id: &str, input: AssignInput) -> AppResult<ReportView> {
        access::require_staff(actor)?;

        let staff_id = match input.staff_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(id) => {
                let staff = self
                    .user_repo
                    .find_by_id(&id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))?;
                if staff.role != UserRole::Staff {
                    return Err(AppError::Validation(
                        "Assigned user must be a staff member".to_string(),
                    ));
                }
                staff.id
            }
            None => actor.id.clone(),
        };

        let mut report = self.report_repo.get_by_id(report_id).await?;
        lifecycle::assign(&mut report, &staff_id, Utc::now().fixed_offset());
        let report = self.report_repo.update_versioned(report).await?;

        tracing::info!(report_id = %report.id, staff_id = %staff_id, by = %actor.id, "Report assigned");
        self.reports.render(report, Some(actor)).await
    }

    /// Change a report's status. Assigned staff member or admin only.
    pub async fn set_status(&self, actor: &Actor, report_id: &str, input: StatusInput) -> AppResult<ReportView> {
        access::require_staff(actor)?;
        input.validate()?;

        let mut report = self.report_repo.get_by_id(report_id).await?;
        access::require_status_editor(&report, actor)?;

        let from = report.status;
        lifecycle::set_status(
            &mut report,
            StatusChange {
                status: input.status,
                resolution_details: input.resolution_details,
                estimated_resolution_date: input.estimated_resolution_date,
            },
            self.lifecycle.strict_transitions,
            Utc::now().fixed_offset(),
        )?;
        let report = self.report_repo.update_versioned(report).await?;

        tracing::info!(report_id = %report.id, %from, to = %report.status, by = %actor.id, "Report status changed");
        self.reports.render(report, Some(actor)).await
    }

    /// Append a staff comment to a report.
    pub async fn add_comment(&self, actor: &Actor, report_id: &str, input: CommentInput) -> AppResult<ReportView> {
        access::require_staff(actor)?;
        let text = lifecycle::validate_comment(&input.comment)?;

        let report = self.report_repo.get_by_id(report_id).await?;
        let report = self.report_repo.update_versioned(report).await?;

        self.comment_repo
            .create(report_comment::ActiveModel {
                id: Set(self.id_gen.generate()),
                report_id: Set(report.id.clone()),
                staff_id: Set(actor.id.clone()),
                comment: Set(text),
                created_at: Set(report.updated_at),
            })
            .await?;

        tracing::info!(report_id = %report.id, staff_id = %actor.id, "Comment added");
        self.reports.render(report, Some(actor)).await
    }

    /// The caller's workload at a glance.
    pub async fn dashboard(&self, actor: &Actor) -> AppResult<Dashboard> {
        access::require_staff(actor)?;

        let counts = self.report_repo.count_by_status_for_staff(&actor.id).await?;
        let stats: Vec<StatusCount> = ReportStatus::iter()
            .map(|status| StatusCount {
                status,
                count: counts
                    .iter()
                    .find(|c| c.status == status)
                    .map_or(0, |c| c.count),
            })
            .collect();
        let total_assigned = stats.iter().map(|s| s.count).sum();

        let assigned = self
            .report_repo
            .find_latest_assigned(&actor.id, DASHBOARD_ASSIGNED)
            .await?;
        let recent = self
            .report_repo
            .find_recent_activity(&actor.id, DASHBOARD_RECENT)
            .await?;

        Ok(Dashboard {
            stats,
            total_assigned,
            assigned_reports: self.reports.render_many(assigned, Some(actor)).await?,
            recent_activity: self.reports.render_many(recent, Some(actor)).await?,
        })
    }

    /// Report counts and average priority per category and status.
    ///
    /// Without bounds the window is the last thirty days.
    pub async fn analytics(&self, actor: &Actor, raw: &AnalyticsQuery) -> AppResult<Analytics> {
        access::require_staff(actor)?;
        let (start_date, end_date) = analytics_window(raw, Utc::now().fixed_offset())?;

        let stats = self
            .report_repo
            .category_status_stats(start_date, end_date)
            .await?;

        Ok(Analytics {
            start_date,
            end_date,
            stats,
        })
    }
}

fn analytics_window(
    raw: &AnalyticsQuery,
    now: DateTime<FixedOffset>,
) -> AppResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let bound = |value: Option<&String>, end_of_day: bool, field: &str| {
        value
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| {
                query::parse_date_bound(v, end_of_day).ok_or_else(|| {
                    AppError::Validation(format!("{field} must be an ISO 8601 date"))
                })
            })
            .transpose()
    };

    let end = bound(raw.end_date.as_ref(), true, "endDate")?.unwrap_or(now);
    let start = bound(raw.start_date.as_ref(), false, "startDate")?
        .unwrap_or_else(|| end - Duration::days(ANALYTICS_DEFAULT_DAYS));

    if start > end {
        return Err(AppError::Validation(
            "endDate must not be before startDate".to_string(),
        ));
    }
    Ok((start, end))
}
