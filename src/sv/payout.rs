use sea_orm::sea_query::Expr;
use serde::Serialize;

use crate::{
  entity::{
    CommissionStatus, PaymentMethod, PayoutStatus, allocation, commission,
    customer, payout,
  },
  prelude::*,
  sv::{
    self,
    notify::{self, Notification, Notifier},
    payment::PaymentDetails,
  },
};

const OPEN: [PayoutStatus; 2] =
  [PayoutStatus::Pending, PayoutStatus::Processing];

pub struct Payout<'a> {
  db: &'a DatabaseConnection,
  notify: &'a dyn Notifier,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutView {
  pub id: i32,
  pub affiliate_id: i32,
  pub amount: Cents,
  pub payment_method: PaymentMethod,
  pub payment_email: Option<String>,
  pub payment_details: json::Value,
  pub status: PayoutStatus,
  pub transaction_id: Option<String>,
  pub notes: Option<String>,
  pub requested_at: DateTime,
  pub processed_at: Option<DateTime>,
  pub paid_at: Option<DateTime>,
}

impl From<payout::Model> for PayoutView {
  fn from(payout: payout::Model) -> Self {
    Self {
      id: payout.id,
      affiliate_id: payout.affiliate_id,
      amount: Cents(payout.amount),
      payment_method: payout.payment_method,
      payment_email: payout.payment_email,
      payment_details: payout.payment_details,
      status: payout.status,
      transaction_id: payout.transaction_id,
      notes: payout.notes,
      requested_at: payout.requested_at,
      processed_at: payout.processed_at,
      paid_at: payout.paid_at,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateBrief {
  pub id: i32,
  pub name: String,
  pub email: String,
  pub referral_code: Option<String>,
}

/// Open payout with the affiliate it belongs to, for the admin queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayout {
  #[serde(flatten)]
  pub payout: PayoutView,
  pub affiliate: Option<AffiliateBrief>,
}

impl<'a> Payout<'a> {
  pub fn new(db: &'a DatabaseConnection, notify: &'a dyn Notifier) -> Self {
    Self { db, notify }
  }

  pub async fn get(&self, id: i32) -> Result<payout::Model> {
    payout::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PayoutNotFound)
  }

  /// Request a payout of `amount` from the affiliate's available balance.
  ///
  /// Without explicit `details` the affiliate's stored payment method is used.
  pub async fn request(
    &self,
    affiliate_id: i32,
    amount: Cents,
    details: Option<PaymentDetails>,
  ) -> Result<payout::Model> {
    self
      .create(affiliate_id, amount, details, &CommissionStatus::PAYABLE)
      .await
  }

  /// Create a payout and reserve `amount` across eligible entries, oldest
  /// first. The balance check and the reservation commit together.
  async fn create(
    &self,
    affiliate_id: i32,
    amount: Cents,
    details: Option<PaymentDetails>,
    eligible: &[CommissionStatus],
  ) -> Result<payout::Model> {
    if amount.0 <= 0 {
      return Err(Error::InvalidArgs("Payout amount must be positive".into()));
    }

    let affiliate = sv::Customer::new(self.db).get(affiliate_id).await?;
    if !affiliate.is_affiliate() {
      return Err(Error::NotAffiliate);
    }

    let txn = self.db.begin().await?;

    let entries = commission::Entity::find()
      .filter(commission::Column::AffiliateId.eq(affiliate_id))
      .filter(commission::Column::Status.is_in(eligible.iter().copied()))
      .order_by_asc(commission::Column::CreatedAt)
      .order_by_asc(commission::Column::Id)
      .all(&txn)
      .await?;

    let available: i64 = entries.iter().map(commission::Model::available).sum();
    if amount.0 > available {
      debug!(
        affiliate_id,
        %amount,
        available = %Cents(available),
        "Insufficient balance"
      );
      return Err(Error::InsufficientBalance);
    }

    let min = sv::settings::load(&txn).await?.min_payout_amount;
    if amount.0 < min {
      return Err(Error::BelowMinimumPayout(Cents(min)));
    }

    let details = match details {
      Some(details) => details,
      None => PaymentDetails::from_customer(&affiliate).ok_or_else(|| {
        Error::InvalidArgs("No payment method configured".into())
      })?,
    };

    let payout = payout::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate_id),
      amount: Set(amount.0),
      payment_method: Set(details.method()),
      payment_email: Set(details.email().map(str::to_string)),
      payment_details: Set(details.to_json()),
      status: Set(PayoutStatus::Pending),
      transaction_id: Set(None),
      notes: Set(None),
      requested_at: Set(now()),
      processed_at: Set(None),
      paid_at: Set(None),
    }
    .insert(&txn)
    .await?;

    let mut remaining = amount.0;
    for entry in entries {
      if remaining == 0 {
        break;
      }
      let take = entry.available().min(remaining);
      if take == 0 {
        continue;
      }

      let reserved = commission::Entity::update_many()
        .col_expr(
          commission::Column::Reserved,
          Expr::col(commission::Column::Reserved).add(take),
        )
        .filter(commission::Column::Id.eq(entry.id))
        .filter(commission::Column::Status.eq(entry.status))
        .filter(commission::Column::Reserved.eq(entry.reserved))
        .filter(commission::Column::PaidOut.eq(entry.paid_out))
        .exec(&txn)
        .await?;
      if reserved.rows_affected != 1 {
        warn!(
          affiliate_id,
          transaction_id = entry.id,
          "Reservation lost a race"
        );
        return Err(Error::Conflict(
          "Balance changed while the payout was requested".into(),
        ));
      }

      allocation::ActiveModel {
        id: NotSet,
        payout_id: Set(payout.id),
        transaction_id: Set(entry.id),
        amount: Set(take),
      }
      .insert(&txn)
      .await?;

      remaining -= take;
    }

    txn.commit().await?;

    info!(
      payout_id = payout.id,
      affiliate_id,
      %amount,
      method = ?payout.payment_method,
      "Payout requested"
    );
    Ok(payout)
  }

  /// Move an open payout to `status`; fails when someone else closed it first.
  async fn transition<C: ConnectionTrait>(
    conn: &C,
    payout: &payout::Model,
    model: payout::ActiveModel,
  ) -> Result<()> {
    let result = payout::Entity::update_many()
      .set(model)
      .filter(payout::Column::Id.eq(payout.id))
      .filter(payout::Column::Status.is_in(OPEN))
      .exec(conn)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::Conflict(format!(
        "Payout {} changed concurrently",
        payout.id
      )));
    }
    Ok(())
  }

  fn ensure_open(payout: &payout::Model) -> Result<()> {
    if payout.status.is_open() {
      Ok(())
    } else {
      Err(Error::InvalidState(format!(
        "Payout {} is already {:?}",
        payout.id, payout.status
      )))
    }
  }

  pub async fn mark_processing(&self, id: i32) -> Result<payout::Model> {
    let payout = self.get(id).await?;
    if payout.status != PayoutStatus::Pending {
      return Err(Error::InvalidState(format!(
        "Payout {id} is {:?}, only pending payouts can be processed",
        payout.status
      )));
    }

    let model = payout::ActiveModel {
      status: Set(PayoutStatus::Processing),
      processed_at: Set(Some(now())),
      ..Default::default()
    };
    Self::transition(self.db, &payout, model).await?;

    info!(payout_id = id, "Payout processing");
    self.get(id).await
  }

  /// Settle a payout: every allocated amount moves from reserved to paid out.
  ///
  /// Entries become `paid` once their whole commission is paid out.
  pub async fn approve(
    &self,
    id: i32,
    transaction_id: Option<String>,
  ) -> Result<payout::Model> {
    let txn = self.db.begin().await?;

    let payout = payout::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    Self::ensure_open(&payout)?;

    let now = now();
    let model = payout::ActiveModel {
      status: Set(PayoutStatus::Paid),
      transaction_id: Set(transaction_id.or(payout.transaction_id.clone())),
      processed_at: Set(Some(payout.processed_at.unwrap_or(now))),
      paid_at: Set(Some(now)),
      ..Default::default()
    };
    Self::transition(&txn, &payout, model).await?;

    let allocations = allocation::Entity::find()
      .filter(allocation::Column::PayoutId.eq(id))
      .all(&txn)
      .await?;

    let mut settled = 0;
    for allocation in allocations {
      let entry = commission::Entity::find_by_id(allocation.transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound)?;

      let paid_out = entry.paid_out + allocation.amount;
      let fully_paid = paid_out >= entry.commission;
      let status =
        if fully_paid { CommissionStatus::Paid } else { entry.status };
      let paid_at = if fully_paid { Some(now) } else { entry.paid_at };

      commission::ActiveModel {
        reserved: Set(entry.reserved - allocation.amount),
        paid_out: Set(paid_out),
        status: Set(status),
        paid_at: Set(paid_at),
        ..entry.into()
      }
      .update(&txn)
      .await?;

      settled += allocation.amount;
    }

    if settled != payout.amount {
      error!(
        payout_id = id,
        settled,
        amount = payout.amount,
        "Allocation mismatch"
      );
      return Err(Error::Internal(format!(
        "Payout {id} allocations do not match its amount"
      )));
    }

    txn.commit().await?;

    let payout = self.get(id).await?;
    info!(
      payout_id = id,
      affiliate_id = payout.affiliate_id,
      "Payout approved"
    );

    if let Some(affiliate) =
      customer::Entity::find_by_id(payout.affiliate_id).one(self.db).await?
    {
      notify::deliver(
        self.notify,
        Notification::PayoutProcessed {
          name: affiliate.name,
          email: affiliate.email,
          amount: Cents(payout.amount),
          payment_method: payout.payment_method,
          transaction_id: payout.transaction_id.clone(),
        },
      )
      .await;
    }

    Ok(payout)
  }

  /// Reject an open payout and give its reservations back to the balance.
  pub async fn reject(
    &self,
    id: i32,
    notes: Option<String>,
  ) -> Result<payout::Model> {
    let txn = self.db.begin().await?;

    let payout = payout::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    Self::ensure_open(&payout)?;

    let model = payout::ActiveModel {
      status: Set(PayoutStatus::Rejected),
      notes: Set(notes.or(payout.notes.clone())),
      processed_at: Set(Some(now())),
      ..Default::default()
    };
    Self::transition(&txn, &payout, model).await?;

    let allocations = allocation::Entity::find()
      .filter(allocation::Column::PayoutId.eq(id))
      .all(&txn)
      .await?;

    for allocation in &allocations {
      commission::Entity::update_many()
        .col_expr(
          commission::Column::Reserved,
          Expr::col(commission::Column::Reserved).sub(allocation.amount),
        )
        .filter(commission::Column::Id.eq(allocation.transaction_id))
        .exec(&txn)
        .await?;
    }

    txn.commit().await?;

    info!(
      payout_id = id,
      released = allocations.len(),
      "Payout rejected"
    );
    self.get(id).await
  }

  pub async fn history(
    &self,
    affiliate_id: i32,
    limit: u64,
  ) -> Result<Vec<PayoutView>> {
    let payouts = payout::Entity::find()
      .filter(payout::Column::AffiliateId.eq(affiliate_id))
      .order_by_desc(payout::Column::RequestedAt)
      .order_by_desc(payout::Column::Id)
      .limit(limit)
      .all(self.db)
      .await?;

    Ok(payouts.into_iter().map(PayoutView::from).collect())
  }

  /// Open payouts, newest first.
  pub async fn pending_with_affiliates(&self) -> Result<Vec<PendingPayout>> {
    let rows = payout::Entity::find()
      .find_also_related(customer::Entity)
      .filter(payout::Column::Status.is_in(OPEN))
      .order_by_desc(payout::Column::RequestedAt)
      .order_by_desc(payout::Column::Id)
      .all(self.db)
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(payout, affiliate)| PendingPayout {
          payout: payout.into(),
          affiliate: affiliate.map(|affiliate| AffiliateBrief {
            id: affiliate.id,
            name: affiliate.name,
            email: affiliate.email,
            referral_code: affiliate.referral_code,
          }),
        })
        .collect(),
    )
  }

  /// Turn every approved balance at or above the minimum into a payout.
  pub async fn process_automatic(&self) -> Result<Vec<payout::Model>> {
    let min = sv::Settings::new(self.db).get().await?.min_payout_amount;

    let approved = commission::Entity::find()
      .filter(commission::Column::Status.eq(CommissionStatus::Approved))
      .all(self.db)
      .await?;

    let mut balances: BTreeMap<i32, i64> = BTreeMap::new();
    for entry in &approved {
      *balances.entry(entry.affiliate_id).or_default() += entry.available();
    }

    let mut created = Vec::new();
    for (affiliate_id, balance) in balances {
      if balance < min {
        continue;
      }

      let Some(affiliate) =
        customer::Entity::find_by_id(affiliate_id).one(self.db).await?
      else {
        continue;
      };
      let details = PaymentDetails::from_customer(&affiliate)
        .unwrap_or(PaymentDetails::Paypal { email: affiliate.email.clone() });

      match self
        .create(
          affiliate_id,
          Cents(balance),
          Some(details),
          &[CommissionStatus::Approved],
        )
        .await
      {
        Ok(payout) => created.push(payout),
        Err(err) => {
          warn!(affiliate_id, "Automatic payout skipped: {err}");
        }
      }
    }

    info!(created = created.len(), "Automatic payouts processed");
    Ok(created)
  }
}
