use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliateSettings::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateSettings::Id)
              .integer()
              .not_null()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateSettings::DefaultRewardType)
              .string()
              .not_null()
              .default("percentage"),
          )
          .col(
            ColumnDef::new(AffiliateSettings::DefaultCommissionRate)
              .integer()
              .not_null()
              .default(1000),
          )
          .col(
            ColumnDef::new(AffiliateSettings::DefaultFixedAmount)
              .big_integer()
              .not_null()
              .default(500),
          )
          .col(
            ColumnDef::new(AffiliateSettings::MinPayoutAmount)
              .big_integer()
              .not_null()
              .default(5000),
          )
          .col(
            ColumnDef::new(AffiliateSettings::CookieLifetimeDays)
              .integer()
              .not_null()
              .default(30),
          )
          .col(
            ColumnDef::new(AffiliateSettings::AutoApprovalEnabled)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(AffiliateSettings::AutoApprovalThreshold)
              .big_integer()
              .not_null()
              .default(10000),
          )
          .col(
            ColumnDef::new(AffiliateSettings::PayoutFrequency)
              .string()
              .not_null()
              .default("monthly"),
          )
          .col(
            ColumnDef::new(AffiliateSettings::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(
            ColumnDef::new(AffiliateSettings::UpdatedAt)
              .date_time()
              .not_null(),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateSettings::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateSettings {
  Table,
  Id,
  DefaultRewardType,
  DefaultCommissionRate,
  DefaultFixedAmount,
  MinPayoutAmount,
  CookieLifetimeDays,
  AutoApprovalEnabled,
  AutoApprovalThreshold,
  PayoutFrequency,
  IsActive,
  UpdatedAt,
}
