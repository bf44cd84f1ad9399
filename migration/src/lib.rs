pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_customers;
mod m20260301_000002_create_orders;
mod m20260301_000003_create_affiliate_transactions;
mod m20260301_000004_create_affiliate_payouts;
mod m20260301_000005_create_affiliate_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260301_000001_create_customers::Migration),
      Box::new(m20260301_000002_create_orders::Migration),
      Box::new(m20260301_000003_create_affiliate_transactions::Migration),
      Box::new(m20260301_000004_create_affiliate_payouts::Migration),
      Box::new(m20260301_000005_create_affiliate_settings::Migration),
    ]
  }
}
