//! Report entity.

use std::fmt;
use std::str::FromStr;

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of civic issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReportCategory {
    #[sea_orm(string_value = "Pothole")]
    Pothole,
    #[sea_orm(string_value = "Waste")]
    Waste,
    #[sea_orm(string_value = "Light")]
    Light,
    #[sea_orm(string_value = "Water")]
    Water,
    #[sea_orm(string_value = "Traffic")]
    Traffic,
    #[sea_orm(string_value = "Other")]
    Other,
}

impl ReportCategory {
    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pothole => "Pothole",
            Self::Waste => "Waste",
            Self::Light => "Light",
            Self::Water => "Water",
            Self::Traffic => "Traffic",
            Self::Other => "Other",
        }
    }
}

impl FromStr for ReportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pothole" => Ok(Self::Pothole),
            "Waste" => Ok(Self::Waste),
            "Light" => Ok(Self::Light),
            "Water" => Ok(Self::Water),
            "Traffic" => Ok(Self::Traffic),
            "Other" => Ok(Self::Other),
            other => Err(format!("Invalid category: {other}")),
        }
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage of a report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReportStatus {
    #[sea_orm(string_value = "Submitted")]
    #[default]
    Submitted,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "In Progress")]
    #[serde(rename = "In Progress")]
    InProgress,
    #[sea_orm(string_value = "Resolved")]
    Resolved,
    #[sea_orm(string_value = "Closed")]
    Closed,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
}

impl ReportStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
            Self::Rejected => "Rejected",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Submitted" => Ok(Self::Submitted),
            "Assigned" => Ok(Self::Assigned),
            "In Progress" => Ok(Self::InProgress),
            "Resolved" => Ok(Self::Resolved),
            "Closed" => Ok(Self::Closed),
            "Rejected" => Ok(Self::Rejected),
            other => Err(format!("Invalid status: {other}")),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored photo attached to a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDescriptor {
    /// Name of the stored (re-encoded) file.
    pub filename: String,
    /// File name as uploaded by the client.
    pub original_name: String,
    /// Content type of the stored file.
    pub mimetype: String,
    /// Size of the stored file in bytes.
    pub size: i64,
    /// Public URL of the stored file.
    pub url: String,
    pub uploaded_at: DateTimeWithTimeZone,
}

/// Photos of a report, persisted as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Photos(pub Vec<PhotoDescriptor>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Human readable `RPT...` number
    #[sea_orm(unique)]
    pub report_number: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub category: ReportCategory,

    /// 1 (lowest) to 5 (highest)
    pub priority: i32,

    pub status: ReportStatus,

    pub longitude: f64,

    pub latitude: f64,

    #[sea_orm(nullable)]
    pub address: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub photos: Photos,

    /// Owner, never changes
    pub citizen_id: String,

    #[sea_orm(nullable)]
    pub assigned_staff_id: Option<String>,

    /// Set on first assignment only
    #[sea_orm(nullable)]
    pub assigned_at: Option<DateTimeWithTimeZone>,

    /// Set the first time the report becomes Resolved
    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub resolution_details: Option<String>,

    #[sea_orm(nullable)]
    pub estimated_resolution_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub actual_resolution_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub feedback_rating: Option<i32>,

    #[sea_orm(nullable)]
    pub feedback_comment: Option<String>,

    #[sea_orm(nullable)]
    pub feedback_submitted_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(default_value = true)]
    pub is_public: bool,

    /// Optimistic concurrency counter
    #[sea_orm(default_value = 1)]
    pub version: i32,

    /// Client supplied creation key, unique per citizen
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CitizenId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Citizen,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedStaffId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    AssignedStaff,

    #[sea_orm(has_many = "super::report_comment::Entity")]
    Comments,
}

impl Related<super::report_comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
