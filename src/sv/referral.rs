use serde::Serialize;
use uuid::Uuid;

use crate::{
  entity::{
    CommissionStatus, OrderStatus, PaymentMethod, RewardType, commission,
    customer, order, settings,
  },
  prelude::*,
  sv::{
    self,
    notify::{self, Notification, Notifier},
    payment::PaymentDetails,
  },
};

pub const CODE_LEN: usize = 8;
/// Uppercase letters and digits without the easily confused `I`, `O`, `0`, `1`.
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: usize = 10;

pub struct Referral<'a> {
  db: &'a DatabaseConnection,
  notify: &'a dyn Notifier,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
  pub referral_code: String,
  /// `false` when the customer was already enrolled.
  pub created: bool,
}

/// Result of recording a referred order.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
  Created(commission::Model),
  AlreadyTracked(commission::Model),
  UnknownCode,
  UnknownOrder,
  SelfReferral,
}

impl TrackOutcome {
  pub fn label(&self) -> &'static str {
    match self {
      TrackOutcome::Created(_) => "created",
      TrackOutcome::AlreadyTracked(_) => "already_tracked",
      TrackOutcome::UnknownCode => "unknown_code",
      TrackOutcome::UnknownOrder => "unknown_order",
      TrackOutcome::SelfReferral => "self_referral",
    }
  }

  pub fn transaction(&self) -> Option<&commission::Model> {
    match self {
      TrackOutcome::Created(tx) | TrackOutcome::AlreadyTracked(tx) => Some(tx),
      _ => None,
    }
  }
}

/// Candidate code from the random bytes of a v4 UUID.
fn random_code() -> String {
  let bytes = Uuid::new_v4().into_bytes();
  bytes
    .iter()
    .enumerate()
    // version and variant bits are fixed in bytes 6 and 8
    .filter(|(i, _)| *i != 6 && *i != 8)
    .take(CODE_LEN)
    .map(|(_, b)| CODE_ALPHABET[(*b % 32) as usize] as char)
    .collect()
}

pub fn referral_link(base_url: &str, code: &str) -> String {
  format!("{}/?ref={}", base_url.trim_end_matches('/'), code)
}

/// Commission owed on `order` under the program's reward type.
pub fn commission_for(
  order: &order::Model,
  affiliate: &customer::Model,
  settings: &settings::Model,
) -> i64 {
  match settings.default_reward_type {
    RewardType::Percentage => {
      Rate(affiliate.commission_rate).apply(order.final_amount)
    }
    RewardType::Fixed => settings.default_fixed_amount.min(order.final_amount),
  }
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection, notify: &'a dyn Notifier) -> Self {
    Self { db, notify }
  }

  pub async fn by_code(&self, code: &str) -> Result<Option<customer::Model>> {
    Ok(
      customer::Entity::find()
        .filter(customer::Column::ReferralCode.eq(code.trim().to_uppercase()))
        .one(self.db)
        .await?,
    )
  }

  pub async fn generate_code(&self) -> Result<String> {
    self.generate_code_with(random_code).await
  }

  async fn generate_code_with(
    &self,
    mut candidate: impl FnMut() -> String,
  ) -> Result<String> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
      let code = candidate();
      if self.by_code(&code).await?.is_none() {
        return Ok(code);
      }
      debug!(attempt, "Referral code collision");
    }

    error!("No free referral code after {MAX_CODE_ATTEMPTS} attempts");
    Err(Error::ReferralCodeExhausted)
  }

  /// Enroll a customer as an affiliate. Enrolling twice keeps the first code.
  pub async fn enroll(
    &self,
    customer_id: i32,
    payment_email: Option<String>,
  ) -> Result<Enrollment> {
    let customer = sv::Customer::new(self.db).get(customer_id).await?;
    if let Some(code) = customer.referral_code {
      debug!(customer_id, "Customer is already an affiliate");
      return Ok(Enrollment { referral_code: code, created: false });
    }

    let settings = sv::Settings::new(self.db).get().await?;
    if !settings.is_active {
      return Err(Error::ProgramInactive);
    }

    let payment = payment_email
      .filter(|_| customer.payment_method.is_none())
      .map(|email| {
        let details = json::json!({ "email": email });
        PaymentDetails::parse(PaymentMethod::Paypal, &details)
      })
      .transpose()?;

    let code = self.generate_code().await?;
    let now = now();
    let mut patch = customer::ActiveModel {
      referral_code: Set(Some(code.clone())),
      commission_rate: Set(settings.default_commission_rate),
      affiliate_since: Set(Some(now)),
      updated_at: Set(now),
      ..Default::default()
    };
    if let Some(payment) = &payment {
      payment.apply(&mut patch);
    }

    // only the first of two racing enrollments gets to set the code
    let result = customer::Entity::update_many()
      .set(patch)
      .filter(customer::Column::Id.eq(customer_id))
      .filter(customer::Column::ReferralCode.is_null())
      .exec(self.db)
      .await
      .map_err(|err| {
        if Error::is_unique_violation(&err) {
          Error::Conflict("referral code already taken".into())
        } else {
          err.into()
        }
      })?;

    if result.rows_affected == 0 {
      let customer = sv::Customer::new(self.db).get(customer_id).await?;
      let code = customer.referral_code.ok_or(Error::CustomerNotFound)?;
      return Ok(Enrollment { referral_code: code, created: false });
    }

    info!(customer_id, %code, "Affiliate enrolled");
    notify::deliver(
      self.notify,
      Notification::Welcome {
        name: customer.name,
        email: customer.email,
        referral_code: code.clone(),
      },
    )
    .await;

    Ok(Enrollment { referral_code: code, created: true })
  }

  /// Record the commission earned by the owner of `code` on `order_id`.
  ///
  /// At most one ledger entry exists per affiliate and order; replays return
  /// the existing entry.
  pub async fn track(&self, code: &str, order_id: i32) -> Result<TrackOutcome> {
    let code = code.trim().to_uppercase();
    let txn = self.db.begin().await?;

    let Some(affiliate) = customer::Entity::find()
      .filter(customer::Column::ReferralCode.eq(&code))
      .one(&txn)
      .await?
    else {
      warn!(%code, order_id, "Unknown referral code, no commission recorded");
      return Ok(TrackOutcome::UnknownCode);
    };

    let Some(order) = order::Entity::find_by_id(order_id).one(&txn).await?
    else {
      warn!(%code, order_id, "Unknown order, no commission recorded");
      return Ok(TrackOutcome::UnknownOrder);
    };

    if order.customer_email.eq_ignore_ascii_case(&affiliate.email) {
      info!(%code, order_id, "Ignoring self-referral");
      return Ok(TrackOutcome::SelfReferral);
    }

    // only paid orders earn commission
    if order.status != OrderStatus::Completed {
      return Err(Error::InvalidState(format!(
        "Order {order_id} is {:?} and earns no commission",
        order.status
      )));
    }

    if let Some(existing) = commission::Entity::find()
      .filter(commission::Column::AffiliateId.eq(affiliate.id))
      .filter(commission::Column::OrderId.eq(order_id))
      .one(&txn)
      .await?
    {
      debug!(%code, order_id, "Referral already tracked");
      return Ok(TrackOutcome::AlreadyTracked(existing));
    }

    let settings = sv::settings::load(&txn).await?;
    let amount = commission_for(&order, &affiliate, &settings);

    let inserted = commission::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate.id),
      order_id: Set(order_id),
      commission: Set(amount),
      reserved: Set(0),
      paid_out: Set(0),
      status: Set(CommissionStatus::Pending),
      created_at: Set(now()),
      paid_at: Set(None),
    }
    .insert(&txn)
    .await;

    let entry = match inserted {
      Ok(entry) => entry,
      Err(err) if Error::is_unique_violation(&err) => {
        drop(txn);
        let existing = commission::Entity::find()
          .filter(commission::Column::AffiliateId.eq(affiliate.id))
          .filter(commission::Column::OrderId.eq(order_id))
          .one(self.db)
          .await?
          .ok_or(Error::TransactionNotFound)?;
        return Ok(TrackOutcome::AlreadyTracked(existing));
      }
      Err(err) => return Err(err.into()),
    };

    txn.commit().await?;

    info!(
      affiliate_id = affiliate.id,
      order_id,
      commission = %Cents(amount),
      "Commission recorded"
    );

    notify::deliver(
      self.notify,
      Notification::ReferralEarned {
        name: affiliate.name,
        email: affiliate.email,
        referral_code: code,
        customer_email: order.customer_email,
        order_amount: Cents(order.final_amount),
        commission: Cents(amount),
      },
    )
    .await;

    Ok(TrackOutcome::Created(entry))
  }

  /// Replace an affiliate's payout destination.
  pub async fn update_payment_method(
    &self,
    customer_id: i32,
    details: &PaymentDetails,
  ) -> Result<customer::Model> {
    let customer = sv::Customer::new(self.db).get(customer_id).await?;
    if !customer.is_affiliate() {
      return Err(Error::NotAffiliate);
    }

    let mut active: customer::ActiveModel = customer.into();
    details.apply(&mut active);
    active.updated_at = Set(now());
    let updated = active.update(self.db).await?;

    info!(customer_id, method = ?details.method(), "Payment method updated");
    Ok(updated)
  }
}
