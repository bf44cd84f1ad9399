use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{allocation, customer, customer::PaymentMethod};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "processing")]
  Processing,
  #[sea_orm(string_value = "paid")]
  Paid,
  #[sea_orm(string_value = "rejected")]
  Rejected,
  #[sea_orm(string_value = "failed")]
  Failed,
}

impl PayoutStatus {
  pub fn is_open(self) -> bool {
    matches!(self, PayoutStatus::Pending | PayoutStatus::Processing)
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_payouts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_id: i32,
  pub amount: i64,
  pub payment_method: PaymentMethod,
  pub payment_email: Option<String>,
  pub payment_details: Json,
  pub status: PayoutStatus,
  /// External payment reference.
  pub transaction_id: Option<String>,
  pub notes: Option<String>,
  pub requested_at: DateTime,
  pub processed_at: Option<DateTime>,
  pub paid_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "customer::Entity",
    from = "Column::AffiliateId",
    to = "customer::Column::Id"
  )]
  Affiliate,
  #[sea_orm(has_many = "allocation::Entity")]
  Allocations,
}

impl Related<customer::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Affiliate.def()
  }
}

impl Related<allocation::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Allocations.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
