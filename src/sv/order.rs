use crate::{
  entity::{OrderStatus, order},
  prelude::*,
  sv::{
    self,
    notify::Notifier,
    referral::{Referral, TrackOutcome},
  },
};

pub struct Order<'a> {
  db: &'a DatabaseConnection,
  notify: &'a dyn Notifier,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub customer_email: String,
  pub customer_name: String,
  pub final_amount: Cents,
  pub currency: Option<String>,
  pub referral_code: Option<String>,
}

impl<'a> Order<'a> {
  pub fn new(db: &'a DatabaseConnection, notify: &'a dyn Notifier) -> Self {
    Self { db, notify }
  }

  pub async fn create(&self, new: NewOrder) -> Result<order::Model> {
    if new.final_amount.0 <= 0 {
      return Err(Error::InvalidArgs("Order amount must be positive".into()));
    }

    let order = order::ActiveModel {
      id: NotSet,
      customer_email: Set(new.customer_email.trim().to_lowercase()),
      customer_name: Set(new.customer_name),
      final_amount: Set(new.final_amount.0),
      currency: Set(new.currency.unwrap_or_else(|| "usd".into())),
      status: Set(OrderStatus::Pending),
      referral_code: Set(
        new
          .referral_code
          .map(|code| code.trim().to_uppercase())
          .filter(|code| !code.is_empty()),
      ),
      created_at: Set(now()),
      completed_at: Set(None),
    }
    .insert(self.db)
    .await?;

    debug!(
      order_id = order.id,
      amount = %Cents(order.final_amount),
      "Order created"
    );
    Ok(order)
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<order::Model>> {
    Ok(order::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i32) -> Result<order::Model> {
    self.by_id(id).await?.ok_or(Error::OrderNotFound)
  }

  /// Mark an order as paid and credit the referring affiliate, if any.
  pub async fn complete(
    &self,
    id: i32,
  ) -> Result<(order::Model, Option<TrackOutcome>)> {
    let order = self.get(id).await?;
    let order = match order.status {
      OrderStatus::Completed => order,
      OrderStatus::Pending => {
        let completed = order::ActiveModel {
          status: Set(OrderStatus::Completed),
          completed_at: Set(Some(now())),
          ..order.into()
        }
        .update(self.db)
        .await?;
        info!(order_id = id, "Order completed");
        completed
      }
      status => {
        return Err(Error::InvalidState(format!(
          "Order {id} is {status:?} and cannot be completed"
        )));
      }
    };

    let outcome = match &order.referral_code {
      Some(code) => {
        Some(Referral::new(self.db, self.notify).track(code, id).await?)
      }
      None => None,
    };

    Ok((order, outcome))
  }

  /// Refund a completed order and cancel the commissions it earned.
  pub async fn refund(&self, id: i32) -> Result<(order::Model, u64)> {
    let order = self.get(id).await?;
    if order.status != OrderStatus::Completed {
      return Err(Error::InvalidState(format!(
        "Order {id} is {:?} and cannot be refunded",
        order.status
      )));
    }

    let order = order::ActiveModel {
      status: Set(OrderStatus::Refunded),
      ..order.into()
    }
    .update(self.db)
    .await?;

    let cancelled =
      sv::Ledger::new(self.db, self.notify).cancel_for_order(id).await?;
    info!(order_id = id, cancelled, "Order refunded");

    Ok((order, cancelled))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::CommissionStatus,
    sv::test_utils::{RecordingNotifier, test_db},
  };

  fn new_order(amount: i64, code: Option<&str>) -> NewOrder {
    NewOrder {
      customer_email: "Buyer@Example.com".into(),
      customer_name: "Buyer".into(),
      final_amount: Cents(amount),
      currency: None,
      referral_code: code.map(str::to_string),
    }
  }

  #[tokio::test]
  async fn test_create_rejects_empty_amount() {
    let db = test_db::setup().await;
    let notify = RecordingNotifier::default();

    let result = Order::new(&db, &notify).create(new_order(0, None)).await;
    assert!(matches!(result, Err(Error::InvalidArgs(_))));
  }

  #[tokio::test]
  async fn test_complete_tracks_referral() {
    let db = test_db::setup().await;
    let notify = RecordingNotifier::default();
    let sv = Order::new(&db, &notify);

    let affiliate = test_db::affiliate(&db, "ann@example.com").await;
    let code = affiliate.referral_code.unwrap().to_lowercase();
    let order = sv.create(new_order(10_000, Some(&code))).await.unwrap();
    assert_eq!(order.customer_email, "buyer@example.com");
    assert_eq!(order.currency, "usd");

    let (order, outcome) = sv.complete(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.completed_at.is_some());
    assert_eq!(outcome.unwrap().transaction().unwrap().commission, 1_000);

    // a replayed completion webhook does not pay twice
    let (_, outcome) = sv.complete(order.id).await.unwrap();
    assert_eq!(outcome.unwrap().label(), "already_tracked");
  }

  #[tokio::test]
  async fn test_complete_without_referral() {
    let db = test_db::setup().await;
    let notify = RecordingNotifier::default();
    let sv = Order::new(&db, &notify);

    let order = sv.create(new_order(10_000, None)).await.unwrap();
    let (_, outcome) = sv.complete(order.id).await.unwrap();
    assert!(outcome.is_none());
    assert!(notify.sent().is_empty());
  }

  #[tokio::test]
  async fn test_refund_cancels_commission() {
    let db = test_db::setup().await;
    let notify = RecordingNotifier::default();
    let sv = Order::new(&db, &notify);

    let affiliate = test_db::affiliate(&db, "ann@example.com").await;
    let order = sv
      .create(new_order(10_000, affiliate.referral_code.as_deref()))
      .await
      .unwrap();

    assert!(matches!(sv.refund(order.id).await, Err(Error::InvalidState(_))));

    sv.complete(order.id).await.unwrap();
    let (order, cancelled) = sv.refund(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(cancelled, 1);

    let ledger = sv::Ledger::new(&db, &notify);
    let recent = ledger.recent(affiliate.id, 10).await.unwrap();
    assert_eq!(recent[0].status, CommissionStatus::Cancelled);
    assert_eq!(ledger.summary(affiliate.id).await.unwrap().available, Cents(0));

    assert!(matches!(sv.complete(order.id).await, Err(Error::InvalidState(_))));
  }
}
