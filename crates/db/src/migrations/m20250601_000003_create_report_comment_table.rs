//! Create report comment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportComment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportComment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportComment::ReportId).string_len(32).not_null())
                    .col(ColumnDef::new(ReportComment::StaffId).string_len(32).not_null())
                    .col(ColumnDef::new(ReportComment::Comment).text().not_null())
                    .col(
                        ColumnDef::new(ReportComment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_comment_report_id")
                            .from(ReportComment::Table, ReportComment::ReportId)
                            .to(Report::Table, Report::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_comment_staff_id")
                            .from(ReportComment::Table, ReportComment::StaffId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: report_id + created_at (comment threads in order)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_comment_report_id_created_at")
                    .table(ReportComment::Table)
                    .col(ReportComment::ReportId)
                    .col(ReportComment::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: staff_id (recent activity on the dashboard)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_comment_staff_id")
                    .table(ReportComment::Table)
                    .col(ReportComment::StaffId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReportComment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReportComment {
    Table,
    Id,
    ReportId,
    StaffId,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
