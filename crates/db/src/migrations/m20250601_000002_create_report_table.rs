//! Create report table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Report::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Report::ReportNumber).string_len(32).not_null())
                    .col(ColumnDef::new(Report::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Report::Description).text().not_null())
                    .col(ColumnDef::new(Report::Category).string_len(16).not_null())
                    .col(ColumnDef::new(Report::Priority).integer().not_null().default(3))
                    .col(
                        ColumnDef::new(Report::Status)
                            .string_len(16)
                            .not_null()
                            .default("Submitted"),
                    )
                    .col(ColumnDef::new(Report::Longitude).double().not_null())
                    .col(ColumnDef::new(Report::Latitude).double().not_null())
                    .col(ColumnDef::new(Report::Address).string_len(500))
                    .col(
                        ColumnDef::new(Report::Photos)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Report::CitizenId).string_len(32).not_null())
                    .col(ColumnDef::new(Report::AssignedStaffId).string_len(32))
                    .col(ColumnDef::new(Report::AssignedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ResolutionDetails).text())
                    .col(ColumnDef::new(Report::EstimatedResolutionDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::ActualResolutionDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::FeedbackRating).integer())
                    .col(ColumnDef::new(Report::FeedbackComment).string_len(500))
                    .col(ColumnDef::new(Report::FeedbackSubmittedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::IsPublic).boolean().not_null().default(true))
                    .col(ColumnDef::new(Report::Version).integer().not_null().default(1))
                    .col(ColumnDef::new(Report::IdempotencyKey).string_len(128))
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Report::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_citizen_id")
                            .from(Report::Table, Report::CitizenId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_assigned_staff_id")
                            .from(Report::Table, Report::AssignedStaffId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: report_number
        manager
            .create_index(
                Index::create()
                    .name("idx_report_report_number")
                    .table(Report::Table)
                    .col(Report::ReportNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Unique index: (citizen_id, idempotency_key) - NULL keys never collide
        manager
            .create_index(
                Index::create()
                    .name("idx_report_citizen_idempotency_key")
                    .table(Report::Table)
                    .col(Report::CitizenId)
                    .col(Report::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: citizen_id + created_at (for "my reports")
        manager
            .create_index(
                Index::create()
                    .name("idx_report_citizen_id_created_at")
                    .table(Report::Table)
                    .col(Report::CitizenId)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: assigned_staff_id (for staff queues)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_assigned_staff_id")
                    .table(Report::Table)
                    .col(Report::AssignedStaffId)
                    .to_owned(),
            )
            .await?;

        // Index: status + category (for filtering and analytics)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_status_category")
                    .table(Report::Table)
                    .col(Report::Status)
                    .col(Report::Category)
                    .to_owned(),
            )
            .await?;

        // Index: longitude + latitude (bounding of nearby queries)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_location")
                    .table(Report::Table)
                    .col(Report::Longitude)
                    .col(Report::Latitude)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_report_created_at")
                    .table(Report::Table)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    ReportNumber,
    Title,
    Description,
    Category,
    Priority,
    Status,
    Longitude,
    Latitude,
    Address,
    Photos,
    CitizenId,
    AssignedStaffId,
    AssignedAt,
    ResolvedAt,
    ResolutionDetails,
    EstimatedResolutionDate,
    ActualResolutionDate,
    FeedbackRating,
    FeedbackComment,
    FeedbackSubmittedAt,
    IsPublic,
    Version,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
