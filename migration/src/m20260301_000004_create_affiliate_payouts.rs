use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_customers::Customers,
  m20260301_000003_create_affiliate_transactions::AffiliateTransactions,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliatePayouts::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliatePayouts::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliatePayouts::AffiliateId).integer().not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayouts::Amount).big_integer().not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayouts::PaymentMethod).string().not_null(),
          )
          .col(ColumnDef::new(AffiliatePayouts::PaymentEmail).string().null())
          .col(
            ColumnDef::new(AffiliatePayouts::PaymentDetails).json().not_null(),
          )
          .col(
            ColumnDef::new(AffiliatePayouts::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(AffiliatePayouts::TransactionId).string().null())
          .col(ColumnDef::new(AffiliatePayouts::Notes).string().null())
          .col(
            ColumnDef::new(AffiliatePayouts::RequestedAt)
              .date_time()
              .not_null(),
          )
          .col(ColumnDef::new(AffiliatePayouts::ProcessedAt).date_time().null())
          .col(ColumnDef::new(AffiliatePayouts::PaidAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_payouts_affiliate")
              .from(AffiliatePayouts::Table, AffiliatePayouts::AffiliateId)
              .to(Customers::Table, Customers::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_payouts_status")
          .table(AffiliatePayouts::Table)
          .col(AffiliatePayouts::Status)
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(PayoutAllocations::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PayoutAllocations::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(PayoutAllocations::PayoutId).integer().not_null())
          .col(
            ColumnDef::new(PayoutAllocations::TransactionId)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(PayoutAllocations::Amount).big_integer().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_payout_allocations_payout")
              .from(PayoutAllocations::Table, PayoutAllocations::PayoutId)
              .to(AffiliatePayouts::Table, AffiliatePayouts::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_payout_allocations_transaction")
              .from(PayoutAllocations::Table, PayoutAllocations::TransactionId)
              .to(AffiliateTransactions::Table, AffiliateTransactions::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payout_allocations_payout")
          .table(PayoutAllocations::Table)
          .col(PayoutAllocations::PayoutId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PayoutAllocations::Table).to_owned())
      .await?;

    manager
      .drop_table(Table::drop().table(AffiliatePayouts::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliatePayouts {
  Table,
  Id,
  AffiliateId,
  Amount,
  PaymentMethod,
  PaymentEmail,
  PaymentDetails,
  Status,
  TransactionId,
  Notes,
  RequestedAt,
  ProcessedAt,
  PaidAt,
}

#[derive(DeriveIden)]
pub enum PayoutAllocations {
  Table,
  Id,
  PayoutId,
  TransactionId,
  Amount,
}
