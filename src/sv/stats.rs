use std::cmp::Reverse;

use sea_orm::sea_query::Expr;
use serde::Serialize;

use crate::{
  entity::{
    CommissionStatus, PaymentMethod, PayoutStatus, commission, customer,
    payout,
  },
  prelude::*,
  sv::{
    self,
    ledger::{LedgerSummary, TransactionView},
    notify::Notifier,
    payment::PaymentDetails,
    payout::PayoutView,
    referral,
  },
};

const RECENT_LIMIT: u64 = 10;
const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateProfile {
  pub id: i32,
  pub name: String,
  pub email: String,
  pub referral_code: Option<String>,
  pub commission_rate: Rate,
  pub total_earnings: Cents,
  pub payment_method: Option<PaymentMethod>,
  pub payment_email: Option<String>,
  pub payment_details: Option<json::Value>,
  pub affiliate_since: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
  pub affiliate: AffiliateProfile,
  pub stats: LedgerSummary,
  pub recent_transactions: Vec<TransactionView>,
  pub payout_history: Vec<PayoutView>,
  pub referral_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutQueue {
  pub count: u64,
  pub total: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAffiliate {
  pub id: i32,
  pub name: String,
  pub email: String,
  pub referral_code: Option<String>,
  pub total_earnings: Cents,
  pub referrals: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStats {
  pub total_affiliates: u64,
  pub total_referrals: u64,
  pub total_commissions: Cents,
  pub total_paid: Cents,
  pub pending_payouts: PayoutQueue,
  pub top_affiliates: Vec<TopAffiliate>,
}

pub struct Stats<'a> {
  db: &'a DatabaseConnection,
  notify: &'a dyn Notifier,
}

impl<'a> Stats<'a> {
  pub fn new(db: &'a DatabaseConnection, notify: &'a dyn Notifier) -> Self {
    Self { db, notify }
  }

  pub async fn dashboard(
    &self,
    customer_id: i32,
    base_url: &str,
  ) -> Result<Dashboard> {
    let affiliate = sv::Customer::new(self.db).get(customer_id).await?;
    let Some(code) = affiliate.referral_code.clone() else {
      return Err(Error::NotAffiliate);
    };

    let ledger = sv::Ledger::new(self.db, self.notify);
    let stats = ledger.summary(customer_id).await?;
    let recent_transactions = ledger.recent(customer_id, RECENT_LIMIT).await?;
    let payout_history = sv::Payout::new(self.db, self.notify)
      .history(customer_id, RECENT_LIMIT)
      .await?;

    let payment_details = PaymentDetails::from_customer(&affiliate)
      .map(|details| details.to_json());

    Ok(Dashboard {
      affiliate: AffiliateProfile {
        id: affiliate.id,
        name: affiliate.name,
        email: affiliate.email,
        referral_code: affiliate.referral_code,
        commission_rate: Rate(affiliate.commission_rate),
        total_earnings: stats.total_earnings,
        payment_method: affiliate.payment_method,
        payment_email: affiliate.payment_email,
        payment_details,
        affiliate_since: affiliate.affiliate_since,
      },
      stats,
      recent_transactions,
      payout_history,
      referral_link: referral::referral_link(base_url, &code),
    })
  }

  /// Program-wide totals for the admin panel.
  pub async fn program(&self) -> Result<ProgramStats> {
    let total_affiliates = customer::Entity::find()
      .filter(customer::Column::ReferralCode.is_not_null())
      .count(self.db)
      .await?;

    type Totals = (i64, Option<i64>, Option<i64>);
    let totals: Option<Totals> = commission::Entity::find()
      .select_only()
      .column_as(Expr::col(commission::Column::Id).count(), "referrals")
      .column_as(Expr::col(commission::Column::Commission).sum(), "commission")
      .column_as(Expr::col(commission::Column::PaidOut).sum(), "paid_out")
      .filter(commission::Column::Status.ne(CommissionStatus::Cancelled))
      .into_tuple()
      .one(self.db)
      .await?;
    let (total_referrals, total_commissions, total_paid) =
      totals.unwrap_or_default();

    let queue: Option<(i64, Option<i64>)> = payout::Entity::find()
      .select_only()
      .column_as(Expr::col(payout::Column::Id).count(), "count")
      .column_as(Expr::col(payout::Column::Amount).sum(), "total")
      .filter(payout::Column::Status.eq(PayoutStatus::Pending))
      .into_tuple()
      .one(self.db)
      .await?;
    let (count, total) = queue.unwrap_or_default();

    Ok(ProgramStats {
      total_affiliates,
      total_referrals: total_referrals as u64,
      total_commissions: Cents(total_commissions.unwrap_or(0)),
      total_paid: Cents(total_paid.unwrap_or(0)),
      pending_payouts: PayoutQueue {
        count: count as u64,
        total: Cents(total.unwrap_or(0)),
      },
      top_affiliates: self.top_affiliates().await?,
    })
  }

  /// Enrolled affiliates by earnings, including those yet to earn anything.
  async fn top_affiliates(&self) -> Result<Vec<TopAffiliate>> {
    let earnings: HashMap<i32, (Option<i64>, i64)> = commission::Entity::find()
      .select_only()
      .column(commission::Column::AffiliateId)
      .column_as(Expr::col(commission::Column::Commission).sum(), "earnings")
      .column_as(Expr::col(commission::Column::Id).count(), "referrals")
      .filter(commission::Column::Status.ne(CommissionStatus::Cancelled))
      .group_by(commission::Column::AffiliateId)
      .into_tuple::<(i32, Option<i64>, i64)>()
      .all(self.db)
      .await?
      .into_iter()
      .map(|(id, total, referrals)| (id, (total, referrals)))
      .collect();

    let mut top: Vec<TopAffiliate> = customer::Entity::find()
      .filter(customer::Column::ReferralCode.is_not_null())
      .all(self.db)
      .await?
      .into_iter()
      .map(|affiliate| {
        let (total, referrals) =
          earnings.get(&affiliate.id).copied().unwrap_or_default();
        TopAffiliate {
          id: affiliate.id,
          name: affiliate.name,
          email: affiliate.email,
          referral_code: affiliate.referral_code,
          total_earnings: Cents(total.unwrap_or(0)),
          referrals: referrals as u64,
        }
      })
      .collect();

    top.sort_by_key(|top| (Reverse(top.total_earnings.0), top.id));
    top.truncate(TOP_LIMIT);
    Ok(top)
  }
}
