//! Report service.
//!
//! Creation, reading, citizen edits, feedback and deletion of reports, and
//! the read projection every report goes through before it leaves the crate.

use std::collections::HashMap;

use chrono::Utc;
use samvad_common::{AppError, AppResult, FieldError, IdGenerator};
use samvad_db::{
    entities::{
        report::{self, Photos, ReportCategory},
        report_comment,
        user::{self, Department},
    },
    repositories::{ReportCommentRepository, ReportRepository, UserRepository},
};
use sea_orm::{ActiveModelTrait, IntoActiveModel};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::{
    access::{self, Actor},
    lifecycle::{self, CitizenChanges, NewReport},
    photo::{PhotoService, PhotoUpload},
    query::{self, ReportQuery},
};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

const fn default_true() -> bool {
    true
}

/// Input for creating a report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportInput {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: String,

    #[validate(length(
        min = 10,
        max = 2000,
        message = "Description must be between 10 and 2000 characters"
    ))]
    pub description: String,

    pub category: ReportCategory,

    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: i32,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(length(max = 500, message = "Address cannot exceed 500 characters"))]
    pub address: Option<String>,

    #[serde(default = "default_true")]
    pub is_public: bool,
}

impl CreateReportInput {
    /// Build the input from multipart text fields.
    pub fn from_form(fields: &HashMap<String, String>) -> AppResult<Self> {
        let mut errors = Vec::new();
        let mut required = |name: &str| -> String {
            let value = fields.get(name).map(|v| v.trim().to_string()).unwrap_or_default();
            if value.is_empty() {
                errors.push(FieldError {
                    field: name.to_string(),
                    message: format!("{name} is required"),
                });
            }
            value
        };

        let title = required("title");
        let description = required("description");
        let category = required("category");
        let priority = required("priority");
        let longitude = required("longitude");
        let latitude = required("latitude");

        let mut invalid = |field: &str, message: String| {
            errors.push(FieldError {
                field: field.to_string(),
                message,
            });
        };

        let category = match category.parse::<ReportCategory>() {
            Ok(c) => Some(c),
            Err(message) => {
                if !category.is_empty() {
                    invalid("category", message);
                }
                None
            }
        };
        let priority = priority.parse::<i32>().ok().or_else(|| {
            if !priority.is_empty() {
                invalid("priority", "Priority must be between 1 and 5".to_string());
            }
            None
        });
        let longitude = longitude.parse::<f64>().ok().or_else(|| {
            if !longitude.is_empty() {
                invalid("longitude", "Longitude must be between -180 and 180".to_string());
            }
            None
        });
        let latitude = latitude.parse::<f64>().ok().or_else(|| {
            if !latitude.is_empty() {
                invalid("latitude", "Latitude must be between -90 and 90".to_string());
            }
            None
        });
        let is_public = match fields.get("isPublic").map(|v| v.trim().to_ascii_lowercase()) {
            None => Some(true),
            Some(v) if v.is_empty() || v == "true" || v == "1" => Some(true),
            Some(v) if v == "false" || v == "0" => Some(false),
            Some(_) => {
                invalid("isPublic", "isPublic must be true or false".to_string());
                None
            }
        };

        match (category, priority, longitude, latitude, is_public) {
            (Some(category), Some(priority), Some(longitude), Some(latitude), Some(is_public))
                if errors.is_empty() =>
            {
                Ok(Self {
                    title,
                    description,
                    category,
                    priority,
                    longitude,
                    latitude,
                    address: fields.get("address").cloned(),
                    is_public,
                })
            }
            _ => {
                errors.sort_by(|a, b| a.field.cmp(&b.field));
                Err(AppError::ValidationFailed(errors))
            }
        }
    }

    /// Trim text fields; a blank address counts as none.
    fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            address: self
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            ..self
        }
    }
}

/// Input for a citizen editing their own report.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportInput {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(
        min = 10,
        max = 2000,
        message = "Description must be between 10 and 2000 characters"
    ))]
    pub description: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: Option<i32>,
}

/// Input for citizen feedback on a resolved report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 500, message = "Feedback comment cannot exceed 500 characters"))]
    pub comment: Option<String>,
}

/// Owner of a report as embedded in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Staff member as embedded in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffView {
    pub id: String,
    pub name: String,
    pub staff_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
}

impl StaffView {
    fn of(user: &user::Model, with_department: bool) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            staff_id: user.staff_id.clone(),
            department: if with_department { user.department } else { None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub staff: Option<StaffView>,
    pub comment: String,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

/// A report as returned to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    #[serde(flatten)]
    pub report: report::Model,
    pub citizen: Option<OwnerView>,
    pub assigned_staff: Option<StaffView>,
    pub comments: Vec<CommentView>,
}

impl ReportView {
    /// Project a stored report for `viewer`.
    ///
    /// Viewers who are neither the owner nor staff get the community view:
    /// no digits in the address and no owner email.
    fn build(
        mut report: report::Model,
        comments: Vec<report_comment::Model>,
        users: &HashMap<String, user::Model>,
        viewer: Option<&Actor>,
    ) -> Self {
        let full = access::sees_full_record(&report, viewer);
        if !full {
            report.address = report.address.as_deref().map(access::anonymize_address);
        }

        let citizen = users.get(&report.citizen_id).map(|u| OwnerView {
            id: u.id.clone(),
            name: u.name.clone(),
            email: full.then(|| u.email.clone()),
        });
        let assigned_staff = report
            .assigned_staff_id
            .as_ref()
            .and_then(|id| users.get(id))
            .map(|u| StaffView::of(u, true));
        let comments = comments
            .into_iter()
            .map(|c| CommentView {
                staff: users.get(&c.staff_id).map(|u| StaffView::of(u, false)),
                id: c.id,
                comment: c.comment,
                created_at: c.created_at,
            })
            .collect();

        Self {
            report,
            citizen,
            assigned_staff,
            comments,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub reports: Vec<ReportView>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

/// Result of a create call.
#[derive(Debug, Clone)]
pub struct Created {
    pub report: ReportView,
    /// The idempotency key matched an earlier submission.
    pub replayed: bool,
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    report_repo: ReportRepository,
    comment_repo: ReportCommentRepository,
    user_repo: UserRepository,
    photos: PhotoService,
    id_gen: IdGenerator,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(
        report_repo: ReportRepository,
        comment_repo: ReportCommentRepository,
        user_repo: UserRepository,
        photos: PhotoService,
    ) -> Self {
        Self {
            report_repo,
            comment_repo,
            user_repo,
            photos,
            id_gen: IdGenerator::new(),
        }
    }

    /// Submit a new report.
    ///
    /// A repeated `idempotency_key` from the same citizen returns the report
    /// created by the first call; photos of the repeat are not stored.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateReportInput,
        uploads: Vec<PhotoUpload>,
        idempotency_key: Option<String>,
    ) -> AppResult<Created> {
        access::require_citizen(actor)?;

        let idempotency_key = idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(key) = &idempotency_key {
            if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(AppError::Validation(format!(
                    "Idempotency-Key cannot exceed {MAX_IDEMPOTENCY_KEY_LEN} characters"
                )));
            }
            if let Some(existing) = self.report_repo.find_by_idempotency_key(&actor.id, key).await? {
                return self.replay(existing, actor).await;
            }
        }

        let input = input.normalized();
        input.validate()?;
        self.photos.check_batch(&uploads)?;

        let photos = self.photos.store_all(uploads).await?;
        let model = lifecycle::new_report(
            self.id_gen.generate(),
            self.id_gen.generate_report_number(),
            actor.id.clone(),
            NewReport {
                title: input.title,
                description: input.description,
                category: input.category,
                priority: input.priority,
                longitude: input.longitude,
                latitude: input.latitude,
                address: input.address,
                is_public: input.is_public,
                photos: Photos(photos),
                idempotency_key: idempotency_key.clone(),
            },
            Utc::now().fixed_offset(),
        );
        let stored_photos = model.photos.0.clone();

        let report = match self.report_repo.create(model.into_active_model().reset_all()).await {
            Ok(report) => report,
            Err(e) => {
                self.photos.release(&stored_photos).await;
                // A concurrent retry with the same key may have won the insert.
                if let Some(key) = &idempotency_key {
                    if let Some(existing) =
                        self.report_repo.find_by_idempotency_key(&actor.id, key).await?
                    {
                        return self.replay(existing, actor).await;
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            report_id = %report.id,
            report_number = %report.report_number,
            citizen_id = %actor.id,
            photos = report.photos.0.len(),
            "Report created"
        );

        Ok(Created {
            report: self.render(report, Some(actor)).await?,
            replayed: false,
        })
    }

    async fn replay(&self, existing: report::Model, actor: &Actor) -> AppResult<Created> {
        tracing::debug!(report_id = %existing.id, "Idempotent create replayed");
        Ok(Created {
            report: self.render(existing, Some(actor)).await?,
            replayed: true,
        })
    }

    /// Get a single report as seen by `viewer`.
    pub async fn get(&self, id: &str, viewer: Option<&Actor>) -> AppResult<ReportView> {
        let report = self.report_repo.get_by_id(id).await?;
        access::ensure_readable(&report, viewer)?;
        self.render(report, viewer).await
    }

    /// List reports matching raw query criteria.
    pub async fn list(&self, viewer: Option<&Actor>, raw: &ReportQuery) -> AppResult<ReportPage> {
        let search = query::parse(viewer, raw)?;
        let (reports, total) = self.report_repo.search(&search).await?;

        Ok(ReportPage {
            reports: self.render_many(reports, viewer).await?,
            total,
            page: search.page,
            pages: query::page_count(total, search.limit),
        })
    }

    /// Edit one's own report while it is still Submitted.
    pub async fn citizen_update(
        &self,
        actor: &Actor,
        id: &str,
        input: UpdateReportInput,
    ) -> AppResult<ReportView> {
        let input = UpdateReportInput {
            title: input.title.map(|t| t.trim().to_string()),
            description: input.description.map(|d| d.trim().to_string()),
            priority: input.priority,
        };
        input.validate()?;

        let mut report = self.load_visible(id, actor).await?;
        lifecycle::citizen_update(
            &mut report,
            actor,
            CitizenChanges {
                title: input.title,
                description: input.description,
                priority: input.priority,
            },
        )?;

        let report = self.report_repo.update_versioned(report).await?;
        tracing::info!(report_id = %report.id, citizen_id = %actor.id, "Report updated by citizen");
        self.render(report, Some(actor)).await
    }

    /// Delete a report and release its photos.
    pub async fn delete(&self, actor: &Actor, id: &str) -> AppResult<()> {
        let report = self.load_visible(id, actor).await?;
        lifecycle::check_delete(&report, actor)?;

        self.report_repo.delete(&report.id).await?;
        self.photos.release(&report.photos.0).await;

        tracing::info!(report_id = %report.id, actor_id = %actor.id, "Report deleted");
        Ok(())
    }

    /// Rate a resolved report.
    pub async fn submit_feedback(
        &self,
        actor: &Actor,
        id: &str,
        input: FeedbackInput,
    ) -> AppResult<ReportView> {
        input.validate()?;
        let comment = input
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let mut report = self.load_visible(id, actor).await?;
        lifecycle::submit_feedback(
            &mut report,
            actor,
            input.rating,
            comment,
            Utc::now().fixed_offset(),
        )?;

        let report = self.report_repo.update_versioned(report).await?;
        tracing::info!(report_id = %report.id, rating = input.rating, "Feedback submitted");
        self.render(report, Some(actor)).await
    }

    /// Load a report the actor is allowed to see.
    pub(crate) async fn load_visible(&self, id: &str, actor: &Actor) -> AppResult<report::Model> {
        let report = self.report_repo.get_by_id(id).await?;
        access::ensure_readable(&report, Some(actor))?;
        Ok(report)
    }

    /// Project one report for `viewer`.
    pub async fn render(&self, report: report::Model, viewer: Option<&Actor>) -> AppResult<ReportView> {
        let mut views = self.render_many(vec![report], viewer).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("Report projection was empty".to_string()))
    }

    /// Project reports for `viewer`, embedding owner, assignee and comments.
    pub async fn render_many(
        &self,
        reports: Vec<report::Model>,
        viewer: Option<&Actor>,
    ) -> AppResult<Vec<ReportView>> {
        if reports.is_empty() {
            return Ok(vec![]);
        }

        let report_ids: Vec<String> = reports.iter().map(|r| r.id.clone()).collect();
        let comments = self.comment_repo.find_by_reports(&report_ids).await?;

        let mut user_ids: Vec<String> = reports
            .iter()
            .flat_map(|r| std::iter::once(r.citizen_id.clone()).chain(r.assigned_staff_id.clone()))
            .chain(comments.iter().map(|c| c.staff_id.clone()))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut comments_by_report: HashMap<String, Vec<report_comment::Model>> = HashMap::new();
        for comment in comments {
            comments_by_report
                .entry(comment.report_id.clone())
                .or_default()
                .push(comment);
        }

        Ok(reports
            .into_iter()
            .map(|r| {
                let comments = comments_by_report.remove(&r.id).unwrap_or_default();
                ReportView::build(r, comments, &users, viewer)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use samvad_common::{LocalStorage, config::UploadConfig};
    use samvad_db::entities::{report::ReportStatus, user::UserRole};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_report(id: &str, citizen_id: &str, status: ReportStatus) -> report::Model {
        let now = Utc::now().fixed_offset();
        let mut r = lifecycle::new_report(
            id.to_string(),
            "RPT123456007".to_string(),
            citizen_id.to_string(),
            NewReport {
                title: "Deep pothole".to_string(),
                description: "Pothole near 14 Lake View Road junction".to_string(),
                category: ReportCategory::Pothole,
                priority: 4,
                longitude: 77.59,
                latitude: 12.97,
                address: Some("14 Lake View Road, 560034".to_string()),
                is_public: true,
                photos: Photos::default(),
                idempotency_key: None,
            },
            now,
        );
        r.status = status;
        r
    }

    fn create_test_user(id: &str, role: UserRole) -> user::Model {
        user::Model {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            password_hash: "x".to_string(),
            role,
            phone: None,
            department: (role == UserRole::Staff).then_some(Department::PublicWorks),
            staff_id: (role == UserRole::Staff).then(|| "STAFF1700000000001".to_string()),
            token: None,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase) -> ReportService {
        service_with(db, temp_storage())
    }

    fn temp_storage() -> Arc<LocalStorage> {
        let dir = std::env::temp_dir().join(format!("samvad-report-{}", uuid::Uuid::new_v4()));
        Arc::new(LocalStorage::new(dir, "/api/uploads".to_string()))
    }

    fn service_with(db: MockDatabase, storage: Arc<LocalStorage>) -> ReportService {
        let conn = Arc::new(db.into_connection());
        ReportService::new(
            ReportRepository::new(conn.clone()),
            ReportCommentRepository::new(conn.clone()),
            UserRepository::new(conn),
            PhotoService::new(storage, UploadConfig::default()),
        )
    }

    fn png_upload() -> PhotoUpload {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            32,
            24,
            image::Rgb([90, 90, 90]),
        ));
        let mut data = std::io::Cursor::new(Vec::new());
        img.write_to(&mut data, image::ImageFormat::Png).unwrap();
        PhotoUpload {
            original_name: "pothole.png".to_string(),
            content_type: "image/png".to_string(),
            data: data.into_inner(),
        }
    }

    fn stored_files(storage: &LocalStorage) -> usize {
        std::fs::read_dir(storage.root()).map_or(0, Iterator::count)
    }

    fn valid_input() -> CreateReportInput {
        CreateReportInput {
            title: "  Broken streetlight ".to_string(),
            description: "Light pole 7 has been dark for a week".to_string(),
            category: ReportCategory::Light,
            priority: 3,
            longitude: 77.6,
            latitude: 12.9,
            address: Some("   ".to_string()),
            is_public: true,
        }
    }

    #[test]
    fn test_form_input_parses_text_fields() {
        let fields = hashmap! {
            "title".to_string() => "Broken streetlight".to_string(),
            "description".to_string() => "Light pole 7 has been dark for a week".to_string(),
            "category".to_string() => "Light".to_string(),
            "priority".to_string() => "2".to_string(),
            "longitude".to_string() => "77.6".to_string(),
            "latitude".to_string() => "12.9".to_string(),
            "isPublic".to_string() => "false".to_string(),
        };
        let input = CreateReportInput::from_form(&fields).unwrap();
        assert_eq!(input.category, ReportCategory::Light);
        assert_eq!(input.priority, 2);
        assert!(!input.is_public);
    }

    #[test]
    fn test_form_input_reports_every_bad_field() {
        let fields = hashmap! {
            "title".to_string() => "Broken streetlight".to_string(),
            "category".to_string() => "Graffiti".to_string(),
            "priority".to_string() => "high".to_string(),
            "longitude".to_string() => "77.6".to_string(),
            "latitude".to_string() => "12.9".to_string(),
        };
        match CreateReportInput::from_form(&fields) {
            Err(AppError::ValidationFailed(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["category", "description", "priority"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_input_is_trimmed_before_validation() {
        let input = valid_input().normalized();
        assert_eq!(input.title, "Broken streetlight");
        assert_eq!(input.address, None);
        assert!(input.validate().is_ok());

        let short = CreateReportInput {
            title: "  abc    ".to_string(),
            ..valid_input()
        }
        .normalized();
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_community_view_hides_owner_details() {
        let r = create_test_report("r1", "c1", ReportStatus::Submitted);
        let users = hashmap! { "c1".to_string() => create_test_user("c1", UserRole::Citizen) };

        let stranger = Actor::new("c2", UserRole::Citizen);
        let view = ReportView::build(r.clone(), vec![], &users, Some(&stranger));
        assert_eq!(view.report.address.as_deref(), Some("Lake View Road"));
        assert_eq!(view.citizen.as_ref().unwrap().email, None);

        let owner = Actor::new("c1", UserRole::Citizen);
        let view = ReportView::build(r, vec![], &users, Some(&owner));
        assert_eq!(view.report.address.as_deref(), Some("14 Lake View Road, 560034"));
        assert_eq!(
            view.citizen.unwrap().email.as_deref(),
            Some("c1@example.com")
        );
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let r = create_test_report("r1", "c1", ReportStatus::InProgress);
        let view = ReportView::build(r, vec![], &HashMap::new(), None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["reportNumber"], "RPT123456007");
        assert_eq!(json["status"], "In Progress");
        assert!(json.get("idempotencyKey").is_none());
        assert!(json["assignedStaff"].is_null());
    }

    #[tokio::test]
    async fn test_staff_cannot_create_reports() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = svc
            .create(&Actor::new("s1", UserRole::Staff), valid_input(), vec![], None)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_replays_idempotency_key() {
        let mut existing = create_test_report("r1", "c1", ReportStatus::Submitted);
        existing.idempotency_key = Some("retry-1".to_string());
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([Vec::<report_comment::Model>::new()])
                .append_query_results([[create_test_user("c1", UserRole::Citizen)]]),
        );

        let created = svc
            .create(
                &Actor::new("c1", UserRole::Citizen),
                valid_input(),
                vec![],
                Some("retry-1".to_string()),
            )
            .await
            .unwrap();
        assert!(created.replayed);
        assert_eq!(created.report.report.id, "r1");
    }

    #[tokio::test]
    async fn test_create_persists_submitted_report() {
        let stored = create_test_report("r1", "c1", ReportStatus::Submitted);
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored]])
                .append_query_results([Vec::<report_comment::Model>::new()])
                .append_query_results([[create_test_user("c1", UserRole::Citizen)]]),
        );

        let created = svc
            .create(&Actor::new("c1", UserRole::Citizen), valid_input(), vec![], None)
            .await
            .unwrap();
        assert!(!created.replayed);
        assert_eq!(created.report.report.status, ReportStatus::Submitted);
        assert_eq!(created.report.citizen.unwrap().id, "c1");
    }

    #[tokio::test]
    async fn test_private_report_hidden_from_other_citizens() {
        let mut private = create_test_report("r1", "c1", ReportStatus::Submitted);
        private.is_public = false;
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[private]]));

        let result = svc.get("r1", Some(&Actor::new("c2", UserRole::Citizen))).await;
        assert!(matches!(result, Err(AppError::ReportNotFound(_))));
    }

    #[tokio::test]
    async fn test_citizen_update_after_assignment_is_invalid_state() {
        let assigned = create_test_report("r1", "c1", ReportStatus::Assigned);
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[assigned]]));

        let result = svc
            .citizen_update(
                &Actor::new("c1", UserRole::Citizen),
                "r1",
                UpdateReportInput {
                    priority: Some(5),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_stale_write_is_conflict() {
        let submitted = create_test_report("r1", "c1", ReportStatus::Submitted);
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[submitted]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }]),
        );

        let result = svc
            .citizen_update(
                &Actor::new("c1", UserRole::Citizen),
                "r1",
                UpdateReportInput {
                    title: Some("Deeper pothole now".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_feedback_rating_out_of_range() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = svc
            .submit_feedback(
                &Actor::new("c1", UserRole::Citizen),
                "r1",
                FeedbackInput {
                    rating: 6,
                    comment: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_staff_delete_any_status() {
        let resolved = create_test_report("r1", "c1", ReportStatus::Resolved);
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[resolved]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );
        svc.delete(&Actor::new("s1", UserRole::Staff), "r1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_photos() {
        let storage = temp_storage();
        let svc = service_with(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())]),
            storage.clone(),
        );

        let result = svc
            .create(
                &Actor::new("c1", UserRole::Citizen),
                valid_input(),
                vec![png_upload(), png_upload()],
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(storage.root().exists());
        assert_eq!(stored_files(&storage), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_photo_files() {
        let storage = temp_storage();
        let photos = PhotoService::new(storage.clone(), UploadConfig::default())
            .store_all(vec![png_upload()])
            .await
            .unwrap();
        assert_eq!(stored_files(&storage), 1);

        let mut report = create_test_report("r1", "c1", ReportStatus::Submitted);
        report.photos = Photos(photos);
        let svc = service_with(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
            storage.clone(),
        );

        svc.delete(&Actor::new("c1", UserRole::Citizen), "r1")
            .await
            .unwrap();
        assert_eq!(stored_files(&storage), 0);
    }
}
