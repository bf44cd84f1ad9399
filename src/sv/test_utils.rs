//! Shared test utilities for database setup

use std::sync::Mutex;

use async_trait::async_trait;

use super::notify::{Notification, Notifier};

/// Keeps every notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
  sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
  pub fn sent(&self) -> Vec<Notification> {
    self.sent.lock().unwrap().clone()
  }

  pub fn clear(&self) {
    self.sent.lock().unwrap().clear();
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send(&self, notification: Notification) -> anyhow::Result<()> {
    self.sent.lock().unwrap().push(notification);
    Ok(())
  }
}

pub mod test_db {
  use uuid::Uuid;

  use crate::{
    entity::{commission, customer, order},
    prelude::*,
    sv::{self, notify::LogNotifier, order::NewOrder},
  };

  /// Creates an in-memory SQLite database with every migration applied
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }

  pub async fn customer(
    db: &DatabaseConnection,
    email: &str,
  ) -> customer::Model {
    let name = email.split('@').next().unwrap_or(email);
    sv::Customer::new(db).get_or_create(email, name).await.unwrap()
  }

  /// Enrolled customer with the default 10% rate and no payment method
  pub async fn affiliate(
    db: &DatabaseConnection,
    email: &str,
  ) -> customer::Model {
    let customer = customer(db, email).await;
    sv::Referral::new(db, &LogNotifier)
      .enroll(customer.id, None)
      .await
      .unwrap();
    sv::Customer::new(db).get(customer.id).await.unwrap()
  }

  pub async fn completed_order(
    db: &DatabaseConnection,
    email: &str,
    amount: i64,
    referral_code: Option<&str>,
  ) -> order::Model {
    let sv = sv::Order::new(db, &LogNotifier);
    let order = sv
      .create(NewOrder {
        customer_email: email.into(),
        customer_name: "Buyer".into(),
        final_amount: Cents(amount),
        currency: None,
        referral_code: referral_code.map(str::to_string),
      })
      .await
      .unwrap();
    sv.complete(order.id).await.unwrap().0
  }

  /// Completed order from a fresh buyer, credited to `affiliate`
  pub async fn referred_order(
    db: &DatabaseConnection,
    affiliate: &customer::Model,
    amount: i64,
  ) -> commission::Model {
    let buyer = format!("{}@buyer.test", Uuid::new_v4().simple());
    let order =
      completed_order(db, &buyer, amount, affiliate.referral_code.as_deref())
        .await;

    commission::Entity::find()
      .filter(commission::Column::AffiliateId.eq(affiliate.id))
      .filter(commission::Column::OrderId.eq(order.id))
      .one(db)
      .await
      .unwrap()
      .unwrap()
  }
}
