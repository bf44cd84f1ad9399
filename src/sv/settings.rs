use serde::{Deserialize, Serialize};

use crate::{
  entity::{PayoutFrequency, RewardType, settings},
  prelude::*,
};

pub const SETTINGS_ID: i32 = 1;

pub struct Settings<'a> {
  db: &'a DatabaseConnection,
}

/// Partial update sent by the admin panel; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
  pub default_reward_type: Option<RewardType>,
  pub default_commission_rate: Option<Rate>,
  pub default_fixed_amount: Option<Cents>,
  pub min_payout_amount: Option<Cents>,
  pub cookie_lifetime_days: Option<i32>,
  pub auto_approval_enabled: Option<bool>,
  pub auto_approval_threshold: Option<Cents>,
  pub payout_frequency: Option<PayoutFrequency>,
  pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
  pub default_reward_type: RewardType,
  pub default_commission_rate: Rate,
  pub default_fixed_amount: Cents,
  pub min_payout_amount: Cents,
  pub cookie_lifetime_days: i32,
  pub auto_approval_enabled: bool,
  pub auto_approval_threshold: Cents,
  pub payout_frequency: PayoutFrequency,
  pub is_active: bool,
  pub updated_at: DateTime,
}

impl From<settings::Model> for SettingsView {
  fn from(model: settings::Model) -> Self {
    Self {
      default_reward_type: model.default_reward_type,
      default_commission_rate: Rate(model.default_commission_rate),
      default_fixed_amount: Cents(model.default_fixed_amount),
      min_payout_amount: Cents(model.min_payout_amount),
      cookie_lifetime_days: model.cookie_lifetime_days,
      auto_approval_enabled: model.auto_approval_enabled,
      auto_approval_threshold: Cents(model.auto_approval_threshold),
      payout_frequency: model.payout_frequency,
      is_active: model.is_active,
      updated_at: model.updated_at,
    }
  }
}

pub fn defaults() -> settings::Model {
  settings::Model {
    id: SETTINGS_ID,
    default_reward_type: RewardType::Percentage,
    default_commission_rate: 1000,
    default_fixed_amount: 500,
    min_payout_amount: 5000,
    cookie_lifetime_days: 30,
    auto_approval_enabled: false,
    auto_approval_threshold: 10_000,
    payout_frequency: PayoutFrequency::Monthly,
    is_active: true,
    updated_at: now(),
  }
}

/// Current settings, falling back to defaults without persisting them.
pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<settings::Model> {
  Ok(
    settings::Entity::find_by_id(SETTINGS_ID)
      .one(conn)
      .await?
      .unwrap_or_else(defaults),
  )
}

impl<'a> Settings<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self) -> Result<settings::Model> {
    load(self.db).await
  }

  pub async fn get_or_create(&self) -> Result<settings::Model> {
    if let Some(settings) =
      settings::Entity::find_by_id(SETTINGS_ID).one(self.db).await?
    {
      return Ok(settings);
    }

    let settings: settings::ActiveModel = defaults().into();
    let settings = settings.reset_all().insert(self.db).await?;

    info!("Created default affiliate settings");
    Ok(settings)
  }

  pub async fn update(&self, patch: SettingsPatch) -> Result<settings::Model> {
    if let Some(rate) = patch.default_commission_rate
      && rate > Rate::MAX
    {
      return Err(Error::InvalidArgs(
        "Commission rate must be between 0 and 100".into(),
      ));
    }
    if let Some(days) = patch.cookie_lifetime_days
      && days <= 0
    {
      return Err(Error::InvalidArgs("Cookie lifetime must be positive".into()));
    }
    if patch.min_payout_amount == Some(Cents(0)) {
      return Err(Error::InvalidArgs(
        "Minimum payout amount must be positive".into(),
      ));
    }

    let current = self.get_or_create().await?;
    let mut settings: settings::ActiveModel = current.into();

    if let Some(value) = patch.default_reward_type {
      settings.default_reward_type = Set(value);
    }
    if let Some(Rate(value)) = patch.default_commission_rate {
      settings.default_commission_rate = Set(value);
    }
    if let Some(Cents(value)) = patch.default_fixed_amount {
      settings.default_fixed_amount = Set(value);
    }
    if let Some(Cents(value)) = patch.min_payout_amount {
      settings.min_payout_amount = Set(value);
    }
    if let Some(value) = patch.cookie_lifetime_days {
      settings.cookie_lifetime_days = Set(value);
    }
    if let Some(value) = patch.auto_approval_enabled {
      settings.auto_approval_enabled = Set(value);
    }
    if let Some(Cents(value)) = patch.auto_approval_threshold {
      settings.auto_approval_threshold = Set(value);
    }
    if let Some(value) = patch.payout_frequency {
      settings.payout_frequency = Set(value);
    }
    if let Some(value) = patch.is_active {
      settings.is_active = Set(value);
    }
    settings.updated_at = Set(now());

    let settings = settings.update(self.db).await?;
    info!(?settings, "Affiliate settings updated");
    Ok(settings)
  }
}
