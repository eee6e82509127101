//! Access policy for reports.
//!
//! Every read and write of a report goes through one of these gates. They are
//! pure functions of the caller and the stored report.

use std::sync::LazyLock;

use regex::Regex;
use samvad_common::{AppError, AppResult};
use samvad_db::{
    entities::{
        report,
        user::{self, UserRole},
    },
    repositories::ReportScope,
};

#[allow(clippy::expect_used)]
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

#[allow(clippy::expect_used)]
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: UserRole,
}

impl Actor {
    #[must_use]
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Staff and admins.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff_or_admin()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether this actor created the report.
    #[must_use]
    pub fn owns(&self, report: &report::Model) -> bool {
        report.citizen_id == self.id
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

/// Whether `viewer` (or an anonymous caller) may see the report.
#[must_use]
pub fn can_read(report: &report::Model, viewer: Option<&Actor>) -> bool {
    report.is_public || viewer.is_some_and(|v| v.is_staff() || v.owns(report))
}

/// Fails with not-found when the viewer may not see the report.
///
/// Private reports of other citizens are indistinguishable from missing ones.
pub fn ensure_readable(report: &report::Model, viewer: Option<&Actor>) -> AppResult<()> {
    if can_read(report, viewer) {
        Ok(())
    } else {
        Err(AppError::ReportNotFound(report.id.clone()))
    }
}

/// The listing scope for a caller and the `mine` / `assigned` flags.
///
/// Anonymous callers always get public reports, whatever they ask for.
#[must_use]
pub fn read_scope(viewer: Option<&Actor>, mine: Option<bool>, assigned: Option<bool>) -> ReportScope {
    match viewer {
        None => ReportScope::PublicOnly,
        Some(actor) if actor.is_staff() => {
            if assigned == Some(true) {
                ReportScope::AssignedTo(actor.id.clone())
            } else {
                ReportScope::All
            }
        }
        Some(actor) => {
            if mine == Some(false) {
                ReportScope::PublicOnly
            } else {
                ReportScope::OwnedBy(actor.id.clone())
            }
        }
    }
}

/// Staff or admin only.
pub fn require_staff(actor: &Actor) -> AppResult<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Staff access required".to_string()))
    }
}

/// Admin only.
pub fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

/// Citizen only.
pub fn require_citizen(actor: &Actor) -> AppResult<()> {
    if actor.role == UserRole::Citizen {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only citizens can perform this action".to_string(),
        ))
    }
}

/// The owner of the report only.
pub fn require_owner(report: &report::Model, actor: &Actor) -> AppResult<()> {
    if actor.owns(report) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to modify this report".to_string(),
        ))
    }
}

/// The assigned staff member, or any admin.
pub fn require_status_editor(report: &report::Model, actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    require_staff(actor)?;
    if report.assigned_staff_id.as_deref() == Some(actor.id.as_str()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the assigned staff member can update this report".to_string(),
        ))
    }
}

/// Whether the viewer sees the full record rather than the community view.
#[must_use]
pub fn sees_full_record(report: &report::Model, viewer: Option<&Actor>) -> bool {
    viewer.is_some_and(|v| v.is_staff() || v.owns(report))
}

/// Address as shown in the community view: every digit removed.
#[must_use]
pub fn anonymize_address(address: &str) -> String {
    let stripped = DIGITS_RE.replace_all(address, "");
    let collapsed = SPACES_RE.replace_all(&stripped, " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_string()
}
