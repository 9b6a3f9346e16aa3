//! Notification storage: the records the ledger emits after commits, plus a
//! per-recipient row carrying the read flag.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    Kind,
    Message,
    Payload,
    LoanId,
    GroupId,
    CreatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum NotificationRecipients {
    Table,
    NotificationId,
    UserId,
    IsRead,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::Kind).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).string().not_null())
                    .col(ColumnDef::new(Notifications::Payload).string().not_null())
                    .col(ColumnDef::new(Notifications::LoanId).string())
                    .col(ColumnDef::new(Notifications::GroupId).string())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notifications::DeletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notifications-created_at")
                    .table(Notifications::Table)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationRecipients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationRecipients::NotificationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationRecipients::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationRecipients::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(NotificationRecipients::NotificationId)
                            .col(NotificationRecipients::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-notification_recipients-notification_id")
                            .from(
                                NotificationRecipients::Table,
                                NotificationRecipients::NotificationId,
                            )
                            .to(Notifications::Table, Notifications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-notification_recipients-user_id")
                            .from(
                                NotificationRecipients::Table,
                                NotificationRecipients::UserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notification_recipients-user_id")
                    .table(NotificationRecipients::Table)
                    .col(NotificationRecipients::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationRecipients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        Ok(())
    }
}
