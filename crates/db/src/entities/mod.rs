//! Database entities.

pub mod report;
pub mod report_comment;
pub mod user;

pub use report::Entity as Report;
pub use report_comment::Entity as ReportComment;
pub use user::Entity as User;
