use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_customers::Customers,
  m20260301_000002_create_orders::Orders,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliateTransactions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateTransactions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::AffiliateId)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::OrderId).integer().not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::Commission)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::Reserved)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::PaidOut)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::CreatedAt)
              .date_time()
              .not_null(),
          )
          .col(ColumnDef::new(AffiliateTransactions::PaidAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_transactions_affiliate")
              .from(
                AffiliateTransactions::Table,
                AffiliateTransactions::AffiliateId,
              )
              .to(Customers::Table, Customers::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_transactions_order")
              .from(AffiliateTransactions::Table, AffiliateTransactions::OrderId)
              .to(Orders::Table, Orders::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // one ledger entry per referred order
    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_transactions_order")
          .table(AffiliateTransactions::Table)
          .col(AffiliateTransactions::AffiliateId)
          .col(AffiliateTransactions::OrderId)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_transactions_status")
          .table(AffiliateTransactions::Table)
          .col(AffiliateTransactions::Status)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateTransactions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateTransactions {
  Table,
  Id,
  AffiliateId,
  OrderId,
  Commission,
  Reserved,
  PaidOut,
  Status,
  CreatedAt,
  PaidAt,
}
