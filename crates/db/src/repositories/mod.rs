//! Database repositories.

pub mod report;
pub mod report_comment;
pub mod user;

pub use report::{
    CategoryStatusStats, GeoFilter, MAX_OFFSET, ReportRepository, ReportScope, ReportSearch, SortField,
    SortSpec, StatusCount,
};
pub use report_comment::ReportCommentRepository;
pub use user::UserRepository;
