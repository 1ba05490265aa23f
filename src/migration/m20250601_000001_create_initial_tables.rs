// ABOUTME: Initial migration to create users, wands, and workorders tables
// ABOUTME: Sets up the schema for accounts, the device registry, and work orders

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(
                        ColumnDef::new(Users::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Wands::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Wands::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Wands::OwnerId).uuid())
                    .col(
                        ColumnDef::new(Wands::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Wands::VerificationCode).string())
                    .col(ColumnDef::new(Wands::CreatedAt).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wands_owner_id")
                            .from(Wands::Table, Wands::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Workorders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Workorders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Workorders::OwnerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Workorders::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Workorders::EmailSubject).text().not_null())
                    .col(ColumnDef::new(Workorders::EmailBody).text().not_null())
                    .col(
                        ColumnDef::new(Workorders::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workorders_owner_id")
                            .from(Workorders::Table, Workorders::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Workorders::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Wands::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    EmailVerified,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Wands {
    Table,
    Id,
    OwnerId,
    Verified,
    VerificationCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Workorders {
    Table,
    Id,
    OwnerId,
    Status,
    EmailSubject,
    EmailBody,
    CreatedAt,
}
