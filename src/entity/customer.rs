use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{commission, payout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  #[sea_orm(string_value = "paypal")]
  Paypal,
  #[sea_orm(string_value = "bank")]
  Bank,
  #[sea_orm(string_value = "stripe")]
  Stripe,
}

/// A storefront customer; affiliate attributes are set once they enroll.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  #[sea_orm(unique)]
  pub email: String,
  pub name: String,
  pub is_admin: bool,
  #[sea_orm(unique)]
  pub referral_code: Option<String>,
  pub referred_by: Option<String>,
  /// Basis points, `1000` is 10%.
  pub commission_rate: i32,
  pub payment_method: Option<PaymentMethod>,
  pub payment_email: Option<String>,
  pub bank_details: Option<Json>,
  pub stripe_account_id: Option<String>,
  pub affiliate_since: Option<DateTime>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  pub fn is_affiliate(&self) -> bool {
    self.referral_code.is_some()
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "commission::Entity")]
  Commissions,
  #[sea_orm(has_many = "payout::Entity")]
  Payouts,
}

impl Related<commission::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Commissions.def()
  }
}

impl Related<payout::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payouts.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
