use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{commission, payout};

/// Portion of one ledger entry backing one payout.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payout_allocations")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub payout_id: i32,
  pub transaction_id: i32,
  pub amount: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "payout::Entity",
    from = "Column::PayoutId",
    to = "payout::Column::Id"
  )]
  Payout,
  #[sea_orm(
    belongs_to = "commission::Entity",
    from = "Column::TransactionId",
    to = "commission::Column::Id"
  )]
  Transaction,
}

impl Related<payout::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payout.def()
  }
}

impl Related<commission::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Transaction.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
