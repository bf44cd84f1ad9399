use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{customer, order};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "paid")]
  Paid,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

impl CommissionStatus {
  /// Statuses whose unreserved remainder can back a payout.
  pub const PAYABLE: [CommissionStatus; 2] =
    [CommissionStatus::Pending, CommissionStatus::Approved];
}

/// Ledger entry: commission earned by one affiliate on one order.
///
/// `reserved` is held by open payouts, `paid_out` is settled by paid ones.
/// An entry turns `Paid` once `paid_out == commission`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_transactions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_id: i32,
  pub order_id: i32,
  pub commission: i64,
  pub reserved: i64,
  pub paid_out: i64,
  pub status: CommissionStatus,
  pub created_at: DateTime,
  pub paid_at: Option<DateTime>,
}

impl Model {
  pub fn available(&self) -> i64 {
    if CommissionStatus::PAYABLE.contains(&self.status) {
      self.commission - self.reserved - self.paid_out
    } else {
      0
    }
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "customer::Entity",
    from = "Column::AffiliateId",
    to = "customer::Column::Id"
  )]
  Affiliate,
  #[sea_orm(
    belongs_to = "order::Entity",
    from = "Column::OrderId",
    to = "order::Column::Id"
  )]
  Order,
}

impl Related<customer::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Affiliate.def()
  }
}

impl Related<order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Order.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
