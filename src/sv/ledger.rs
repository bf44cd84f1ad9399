use sea_orm::sea_query::Expr;
use serde::Serialize;

use crate::{
  entity::{CommissionStatus, OrderStatus, commission, customer, order},
  prelude::*,
  sv::{
    self,
    notify::{self, Notification, Notifier},
  },
};

pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
  notify: &'a dyn Notifier,
}

/// Balances of one affiliate, derived from the ledger on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
  pub total_commissions: Cents,
  pub total_referrals: u64,
  #[serde(rename = "pendingCommissions")]
  pub pending: Cents,
  #[serde(rename = "approvedCommissions")]
  pub approved: Cents,
  #[serde(rename = "paidCommissions")]
  pub paid: Cents,
  /// Not yet reserved by a payout nor paid out.
  #[serde(rename = "availableBalance")]
  pub available: Cents,
  pub total_earnings: Cents,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
  pub id: i32,
  pub order_id: i32,
  pub commission: Cents,
  pub paid_out: Cents,
  pub status: CommissionStatus,
  pub created_at: DateTime,
  pub paid_at: Option<DateTime>,
  pub order_amount: Option<Cents>,
  pub currency: Option<String>,
  pub customer_email: Option<String>,
}

impl From<(commission::Model, Option<order::Model>)> for TransactionView {
  fn from((tx, order): (commission::Model, Option<order::Model>)) -> Self {
    Self {
      id: tx.id,
      order_id: tx.order_id,
      commission: Cents(tx.commission),
      paid_out: Cents(tx.paid_out),
      status: tx.status,
      created_at: tx.created_at,
      paid_at: tx.paid_at,
      order_amount: order.as_ref().map(|order| Cents(order.final_amount)),
      currency: order.as_ref().map(|order| order.currency.clone()),
      customer_email: order.map(|order| order.customer_email),
    }
  }
}

type StatusRow = (CommissionStatus, i64, Option<i64>, Option<i64>, Option<i64>);

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection, notify: &'a dyn Notifier) -> Self {
    Self { db, notify }
  }

  pub async fn summary(&self, affiliate_id: i32) -> Result<LedgerSummary> {
    let rows: Vec<StatusRow> = commission::Entity::find()
      .select_only()
      .column(commission::Column::Status)
      .column_as(Expr::col(commission::Column::Id).count(), "entries")
      .column_as(Expr::col(commission::Column::Commission).sum(), "commission")
      .column_as(Expr::col(commission::Column::Reserved).sum(), "reserved")
      .column_as(Expr::col(commission::Column::PaidOut).sum(), "paid_out")
      .filter(commission::Column::AffiliateId.eq(affiliate_id))
      .group_by(commission::Column::Status)
      .into_tuple()
      .all(self.db)
      .await?;

    let mut summary = LedgerSummary::default();
    for (status, entries, commission, reserved, paid_out) in rows {
      let commission = commission.unwrap_or(0);
      let reserved = reserved.unwrap_or(0);
      let paid_out = paid_out.unwrap_or(0);

      summary.total_referrals += entries as u64;
      summary.paid.0 += paid_out;
      if status == CommissionStatus::Cancelled {
        continue;
      }

      summary.total_commissions.0 += commission;
      match status {
        CommissionStatus::Pending => {
          summary.pending.0 += commission - paid_out
        }
        CommissionStatus::Approved => {
          summary.approved.0 += commission - paid_out
        }
        _ => {}
      }
      if CommissionStatus::PAYABLE.contains(&status) {
        summary.available.0 += commission - reserved - paid_out;
      }
    }
    summary.total_earnings = summary.total_commissions;

    Ok(summary)
  }

  /// Most recent entries first, with the order that earned them.
  pub async fn recent(
    &self,
    affiliate_id: i32,
    limit: u64,
  ) -> Result<Vec<TransactionView>> {
    let rows = commission::Entity::find()
      .find_also_related(order::Entity)
      .filter(commission::Column::AffiliateId.eq(affiliate_id))
      .order_by_desc(commission::Column::CreatedAt)
      .order_by_desc(commission::Column::Id)
      .limit(limit)
      .all(self.db)
      .await?;

    Ok(rows.into_iter().map(TransactionView::from).collect())
  }

  pub async fn get(&self, id: i32) -> Result<commission::Model> {
    commission::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::TransactionNotFound)
  }

  /// Approve pending commissions on completed orders of at least `threshold`.
  ///
  /// Falls back to the configured auto-approval threshold. Returns the number
  /// of entries approved.
  pub async fn auto_approve(&self, threshold: Option<Cents>) -> Result<u64> {
    let threshold = match threshold {
      Some(threshold) => threshold,
      None => {
        Cents(sv::Settings::new(self.db).get().await?.auto_approval_threshold)
      }
    };

    let candidates = commission::Entity::find()
      .find_also_related(order::Entity)
      .filter(commission::Column::Status.eq(CommissionStatus::Pending))
      .filter(order::Column::Status.eq(OrderStatus::Completed))
      .filter(order::Column::FinalAmount.gte(threshold.0))
      .order_by_asc(commission::Column::Id)
      .all(self.db)
      .await?;

    let mut approved = 0;
    let mut notifications = Vec::new();
    for (tx, _) in candidates {
      // another writer may have moved the entry since it was read
      let result = commission::Entity::update_many()
        .col_expr(
          commission::Column::Status,
          Expr::value(CommissionStatus::Approved),
        )
        .filter(commission::Column::Id.eq(tx.id))
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .exec(self.db)
        .await?;
      if result.rows_affected == 0 {
        continue;
      }
      approved += 1;

      if let Some(affiliate) =
        customer::Entity::find_by_id(tx.affiliate_id).one(self.db).await?
      {
        notifications.push(Notification::CommissionApproved {
          name: affiliate.name,
          email: affiliate.email,
          order_id: tx.order_id,
          commission: Cents(tx.commission),
        });
      }
    }

    info!(approved, threshold = %threshold, "Auto-approved commissions");
    notify::deliver_all(self.notify, notifications).await;
    Ok(approved)
  }

  /// Cancel an entry no payout has touched.
  pub async fn cancel(&self, id: i32) -> Result<commission::Model> {
    let tx = self.get(id).await?;
    if !CommissionStatus::PAYABLE.contains(&tx.status) {
      return Err(Error::InvalidState(format!(
        "Commission {id} is {:?} and cannot be cancelled",
        tx.status
      )));
    }
    if tx.reserved > 0 || tx.paid_out > 0 {
      return Err(Error::InvalidState(format!(
        "Commission {id} is already part of a payout"
      )));
    }

    let result = commission::Entity::update_many()
      .col_expr(
        commission::Column::Status,
        Expr::value(CommissionStatus::Cancelled),
      )
      .filter(commission::Column::Id.eq(id))
      .filter(commission::Column::Status.is_in(CommissionStatus::PAYABLE))
      .filter(commission::Column::Reserved.eq(0))
      .filter(commission::Column::PaidOut.eq(0))
      .exec(self.db)
      .await?;
    if result.rows_affected == 0 {
      return Err(Error::Conflict(format!(
        "Commission {id} changed concurrently"
      )));
    }

    info!(transaction_id = id, "Commission cancelled");
    self.get(id).await
  }

  /// Cancel the unsettled commissions earned by a refunded order.
  pub async fn cancel_for_order(&self, order_id: i32) -> Result<u64> {
    let entries = commission::Entity::find()
      .filter(commission::Column::OrderId.eq(order_id))
      .filter(commission::Column::Status.is_in(CommissionStatus::PAYABLE))
      .all(self.db)
      .await?;

    let mut cancelled = 0;
    for tx in entries {
      match self.cancel(tx.id).await {
        Ok(_) => cancelled += 1,
        Err(Error::InvalidState(reason) | Error::Conflict(reason)) => {
          warn!(order_id, transaction_id = tx.id, "Commission kept: {reason}");
        }
        Err(err) => return Err(err),
      }
    }

    Ok(cancelled)
  }
}
