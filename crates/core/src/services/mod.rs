//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod lifecycle;
pub mod photo;
pub mod query;
pub mod report;
pub mod staff;
pub mod user;

pub use access::Actor;
pub use photo::{PhotoService, PhotoUpload};
pub use query::ReportQuery;
pub use report::{
    CreateReportInput, Created, FeedbackInput, ReportPage, ReportService, ReportView,
    UpdateReportInput,
};
pub use staff::{
    Analytics, AnalyticsQuery, AssignInput, CommentInput, Dashboard, StaffService, StatusInput,
};
pub use user::{
    ChangePasswordInput, CreateStaffInput, LoginInput, RegisterInput, UpdateProfileInput,
    UserService,
};
