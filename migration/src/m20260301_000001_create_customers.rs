use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Customers::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Customers::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Customers::Email).string().not_null())
          .col(ColumnDef::new(Customers::Name).string().not_null())
          .col(
            ColumnDef::new(Customers::IsAdmin)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Customers::ReferralCode).string().null())
          .col(ColumnDef::new(Customers::ReferredBy).string().null())
          .col(
            ColumnDef::new(Customers::CommissionRate)
              .integer()
              .not_null()
              .default(1000),
          )
          .col(ColumnDef::new(Customers::PaymentMethod).string().null())
          .col(ColumnDef::new(Customers::PaymentEmail).string().null())
          .col(ColumnDef::new(Customers::BankDetails).json().null())
          .col(ColumnDef::new(Customers::StripeAccountId).string().null())
          .col(ColumnDef::new(Customers::AffiliateSince).date_time().null())
          .col(ColumnDef::new(Customers::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Customers::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_customers_email")
          .table(Customers::Table)
          .col(Customers::Email)
          .unique()
          .to_owned(),
      )
      .await?;

    // NULLs are distinct in SQLite, so non-affiliates never collide here
    manager
      .create_index(
        Index::create()
          .name("idx_customers_referral_code")
          .table(Customers::Table)
          .col(Customers::ReferralCode)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Customers::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Customers {
  Table,
  Id,
  Email,
  Name,
  IsAdmin,
  ReferralCode,
  ReferredBy,
  CommissionRate,
  PaymentMethod,
  PaymentEmail,
  BankDetails,
  StripeAccountId,
  AffiliateSince,
  CreatedAt,
  UpdatedAt,
}
