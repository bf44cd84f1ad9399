use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Orders::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Orders::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
          .col(ColumnDef::new(Orders::CustomerName).string().not_null())
          .col(ColumnDef::new(Orders::FinalAmount).big_integer().not_null())
          .col(
            ColumnDef::new(Orders::Currency)
              .string()
              .not_null()
              .default("usd"),
          )
          .col(
            ColumnDef::new(Orders::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Orders::ReferralCode).string().null())
          .col(ColumnDef::new(Orders::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Orders::CompletedAt).date_time().null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_referral_code")
          .table(Orders::Table)
          .col(Orders::ReferralCode)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Orders {
  Table,
  Id,
  CustomerEmail,
  CustomerName,
  FinalAmount,
  Currency,
  Status,
  ReferralCode,
  CreatedAt,
  CompletedAt,
}
