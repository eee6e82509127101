//! Report lifecycle.
//!
//! Status transitions, timestamping and the gates that decide who may change
//! a report in which state. Everything here operates on an in-memory
//! [`report::Model`]; persistence is the caller's job.

use chrono::{DateTime, FixedOffset};
use samvad_common::{AppError, AppResult};
use samvad_db::entities::report::{self, Photos, ReportCategory, ReportStatus};

use crate::services::access::Actor;

/// Maximum length of a staff comment, in characters.
pub const MAX_COMMENT_LEN: usize = 1000;

/// Statuses reachable from `from` in one step (re-setting `from` is always allowed).
#[must_use]
pub const fn allowed_next(from: ReportStatus) -> &'static [ReportStatus] {
    use ReportStatus::{Assigned, Closed, InProgress, Rejected, Resolved, Submitted};
    match from {
        Submitted => &[Assigned, InProgress, Rejected],
        Assigned => &[InProgress, Resolved, Rejected],
        InProgress => &[Assigned, Resolved, Rejected],
        Resolved => &[InProgress, Closed, Rejected],
        Closed => &[Resolved, Rejected],
        Rejected => &[],
    }
}

/// Whether a report may move from `from` to `to`.
///
/// With `strict == false` every known status is reachable from every other.
#[must_use]
pub fn can_transition(from: ReportStatus, to: ReportStatus, strict: bool) -> bool {
    !strict || from == to || allowed_next(from).contains(&to)
}

/// Validated content of a report about to be created.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub category: ReportCategory,
    pub priority: i32,
    pub longitude: f64,
    pub latitude: f64,
    pub address: Option<String>,
    pub is_public: bool,
    pub photos: Photos,
    pub idempotency_key: Option<String>,
}

/// Build a freshly submitted report owned by `citizen_id`.
#[must_use]
pub fn new_report(
    id: String,
    report_number: String,
    citizen_id: String,
    input: NewReport,
    now: DateTime<FixedOffset>,
) -> report::Model {
    report::Model {
        id,
        report_number,
        title: input.title,
        description: input.description,
        category: input.category,
        priority: input.priority,
        status: ReportStatus::Submitted,
        longitude: input.longitude,
        latitude: input.latitude,
        address: input.address,
        photos: input.photos,
        citizen_id,
        assigned_staff_id: None,
        assigned_at: None,
        resolved_at: None,
        resolution_details: None,
        estimated_resolution_date: None,
        actual_resolution_date: None,
        feedback_rating: None,
        feedback_comment: None,
        feedback_submitted_at: None,
        is_public: input.is_public,
        version: 1,
        idempotency_key: input.idempotency_key,
        created_at: now,
        updated_at: now,
    }
}

/// Point the report at a staff member.
///
/// The first assignment stamps `assigned_at` and moves a Submitted report to
/// Assigned. Reassignment only changes the assignee.
pub fn assign(report: &mut report::Model, staff_id: &str, now: DateTime<FixedOffset>) {
    report.assigned_staff_id = Some(staff_id.to_string());
    if report.assigned_at.is_none() {
        report.assigned_at = Some(now);
    }
    if report.status == ReportStatus::Submitted {
        report.status = ReportStatus::Assigned;
    }
}

/// A requested status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: ReportStatus,
    pub resolution_details: Option<String>,
    pub estimated_resolution_date: Option<DateTime<FixedOffset>>,
}

/// Apply a status change, checking it against the transition table.
///
/// The first entry into Resolved stamps `resolved_at` and
/// `actual_resolution_date`; later entries keep the original stamps.
pub fn set_status(
    report: &mut report::Model,
    change: StatusChange,
    strict: bool,
    now: DateTime<FixedOffset>,
) -> AppResult<()> {
    if !can_transition(report.status, change.status, strict) {
        return Err(AppError::InvalidState(format!(
            "Cannot change status from {} to {}",
            report.status, change.status
        )));
    }

    report.status = change.status;
    if change.status == ReportStatus::Resolved && report.resolved_at.is_none() {
        report.resolved_at = Some(now);
        report.actual_resolution_date = Some(now);
    }
    if let Some(details) = change.resolution_details {
        report.resolution_details = Some(details);
    }
    if let Some(date) = change.estimated_resolution_date {
        report.estimated_resolution_date = Some(date);
    }
    Ok(())
}

/// Trim a staff comment and check its length.
pub fn validate_comment(text: &str) -> AppResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Comment is required".to_string()));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "Comment cannot exceed {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Record citizen feedback, replacing any earlier feedback.
pub fn submit_feedback(
    report: &mut report::Model,
    actor: &Actor,
    rating: i32,
    comment: Option<String>,
    now: DateTime<FixedOffset>,
) -> AppResult<()> {
    if !actor.owns(report) {
        return Err(AppError::Forbidden(
            "Not authorized to provide feedback for this report".to_string(),
        ));
    }
    if report.status != ReportStatus::Resolved {
        return Err(AppError::InvalidState(
            "Feedback can only be provided for resolved reports".to_string(),
        ));
    }

    report.feedback_rating = Some(rating);
    report.feedback_comment = comment;
    report.feedback_submitted_at = Some(now);
    Ok(())
}

/// Fields a citizen may edit on their own report.
#[derive(Debug, Clone, Default)]
pub struct CitizenChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
}

/// Apply a citizen's edit. Only the owner, and only while Submitted.
pub fn citizen_update(
    report: &mut report::Model,
    actor: &Actor,
    changes: CitizenChanges,
) -> AppResult<()> {
    if !actor.owns(report) {
        return Err(AppError::Forbidden(
            "Not authorized to update this report".to_string(),
        ));
    }
    if report.status != ReportStatus::Submitted {
        return Err(AppError::InvalidState(
            "Cannot update report after it has been assigned".to_string(),
        ));
    }

    if let Some(title) = changes.title {
        report.title = title;
    }
    if let Some(description) = changes.description {
        report.description = description;
    }
    if let Some(priority) = changes.priority {
        report.priority = priority;
    }
    Ok(())
}

/// Whether `actor` may delete the report.
///
/// Staff and admins may delete any report; citizens only their own while it
/// is still Submitted.
pub fn check_delete(report: &report::Model, actor: &Actor) -> AppResult<()> {
    if actor.is_staff() {
        return Ok(());
    }
    if !actor.owns(report) {
        return Err(AppError::Forbidden(
            "Not authorized to delete this report".to_string(),
        ));
    }
    if report.status != ReportStatus::Submitted {
        return Err(AppError::InvalidState(
            "Cannot delete report after it has been assigned".to_string(),
        ));
    }
    Ok(())
}
