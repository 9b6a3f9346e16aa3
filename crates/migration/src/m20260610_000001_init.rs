//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for the loan ledger:
//!
//! - `users`: registered identities (owned by the auth stack, referenced here)
//! - `groups`: member circles loans can be scoped to
//! - `group_memberships`: who currently belongs to a group
//! - `loans`: money owed between two parties, or a split parent plus children
//! - `transactions`: directional ledger entries backing each loan

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    AuthSubject,
    Email,
    FirstName,
    LastName,
    DeletedAt,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    CreatorId,
    DeletedAt,
}

#[derive(Iden)]
enum GroupMemberships {
    Table,
    GroupId,
    UserId,
    Role,
    DeletedAt,
}

#[derive(Iden)]
enum Loans {
    Table,
    Id,
    AmountMinor,
    Description,
    DueDate,
    Status,
    IsAcknowledged,
    LenderId,
    LenderEmail,
    BorrowerId,
    BorrowerEmail,
    GroupId,
    ParentId,
    DeletedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    LoanId,
    AmountMinor,
    Description,
    Category,
    Direction,
    OccurredAt,
    PayerId,
    GroupId,
    Title,
    DeletedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::AuthSubject).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::FirstName).string().not_null())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(ColumnDef::new(Users::DeletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-auth_subject-unique")
                    .table(Users::Table)
                    .col(Users::AuthSubject)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-email-unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Groups
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::CreatorId).string().not_null())
                    .col(ColumnDef::new(Groups::DeletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-groups-creator_id")
                            .from(Groups::Table, Groups::CreatorId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Group memberships
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GroupMemberships::GroupId).string().not_null())
                    .col(ColumnDef::new(GroupMemberships::UserId).string().not_null())
                    .col(ColumnDef::new(GroupMemberships::Role).string().not_null())
                    .col(ColumnDef::new(GroupMemberships::DeletedAt).timestamp())
                    .primary_key(
                        Index::create()
                            .col(GroupMemberships::GroupId)
                            .col(GroupMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-group_id")
                            .from(GroupMemberships::Table, GroupMemberships::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-user_id")
                            .from(GroupMemberships::Table, GroupMemberships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_memberships-user_id")
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Loans
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Loans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Loans::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Loans::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Loans::Description).string().not_null())
                    .col(ColumnDef::new(Loans::DueDate).timestamp().not_null())
                    .col(
                        ColumnDef::new(Loans::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Loans::IsAcknowledged)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Loans::LenderId).string())
                    .col(ColumnDef::new(Loans::LenderEmail).string())
                    .col(ColumnDef::new(Loans::BorrowerId).string())
                    .col(ColumnDef::new(Loans::BorrowerEmail).string())
                    .col(ColumnDef::new(Loans::GroupId).string())
                    .col(ColumnDef::new(Loans::ParentId).string())
                    .col(ColumnDef::new(Loans::DeletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-lender_id")
                            .from(Loans::Table, Loans::LenderId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-borrower_id")
                            .from(Loans::Table, Loans::BorrowerId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-group_id")
                            .from(Loans::Table, Loans::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-parent_id")
                            .from(Loans::Table, Loans::ParentId)
                            .to(Loans::Table, Loans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-parent_id")
                    .table(Loans::Table)
                    .col(Loans::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-lender_id")
                    .table(Loans::Table)
                    .col(Loans::LenderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-borrower_id")
                    .table(Loans::Table)
                    .col(Loans::BorrowerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-status-due_date")
                    .table(Loans::Table)
                    .col(Loans::Status)
                    .col(Loans::DueDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::LoanId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(ColumnDef::new(Transactions::Direction).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::PayerId).string().not_null())
                    .col(ColumnDef::new(Transactions::GroupId).string())
                    .col(ColumnDef::new(Transactions::Title).string().not_null())
                    .col(ColumnDef::new(Transactions::DeletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-loan_id")
                            .from(Transactions::Table, Transactions::LoanId)
                            .to(Loans::Table, Loans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-payer_id")
                            .from(Transactions::Table, Transactions::PayerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-loan_id")
                    .table(Transactions::Table)
                    .col(Transactions::LoanId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-payer_id")
                    .table(Transactions::Table)
                    .col(Transactions::PayerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Loans::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
