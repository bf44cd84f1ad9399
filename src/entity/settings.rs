use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
  #[sea_orm(string_value = "percentage")]
  #[default]
  Percentage,
  #[sea_orm(string_value = "fixed")]
  Fixed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
  #[sea_orm(string_value = "weekly")]
  Weekly,
  #[sea_orm(string_value = "monthly")]
  #[default]
  Monthly,
  #[sea_orm(string_value = "quarterly")]
  Quarterly,
}

impl PayoutFrequency {
  pub fn period(self) -> std::time::Duration {
    let days = match self {
      PayoutFrequency::Weekly => 7,
      PayoutFrequency::Monthly => 30,
      PayoutFrequency::Quarterly => 90,
    };
    std::time::Duration::from_secs(days * 24 * 3600)
  }
}

/// Program-wide configuration, a single row with `id = 1`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_settings")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i32,
  pub default_reward_type: RewardType,
  pub default_commission_rate: i32,
  pub default_fixed_amount: i64,
  pub min_payout_amount: i64,
  pub cookie_lifetime_days: i32,
  pub auto_approval_enabled: bool,
  pub auto_approval_threshold: i64,
  pub payout_frequency: PayoutFrequency,
  pub is_active: bool,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
