//! Outbound affiliate notifications.
//!
//! Delivery is best effort: a failed notification is logged and never rolls
//! back the ledger change that triggered it.

use async_trait::async_trait;
use futures::future;
use reqwest::Client;
use serde::Serialize;

use crate::{entity::PaymentMethod, prelude::*};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
  #[serde(rename_all = "camelCase")]
  Welcome { name: String, email: String, referral_code: String },
  #[serde(rename_all = "camelCase")]
  ReferralEarned {
    name: String,
    email: String,
    referral_code: String,
    customer_email: String,
    order_amount: Cents,
    commission: Cents,
  },
  #[serde(rename_all = "camelCase")]
  CommissionApproved {
    name: String,
    email: String,
    order_id: i32,
    commission: Cents,
  },
  #[serde(rename_all = "camelCase")]
  PayoutProcessed {
    name: String,
    email: String,
    amount: Cents,
    payment_method: PaymentMethod,
    transaction_id: Option<String>,
  },
}

impl Notification {
  pub fn recipient(&self) -> &str {
    match self {
      Notification::Welcome { email, .. }
      | Notification::ReferralEarned { email, .. }
      | Notification::CommissionApproved { email, .. }
      | Notification::PayoutProcessed { email, .. } => email,
    }
  }
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

pub async fn deliver(notifier: &dyn Notifier, notification: Notification) {
  let to = notification.recipient().to_string();
  if let Err(err) = notifier.send(notification).await {
    warn!(%to, "notification not delivered: {err:#}");
  }
}

/// Deliver a batch concurrently so one slow recipient doesn't hold up the rest.
pub async fn deliver_all(
  notifier: &dyn Notifier,
  notifications: Vec<Notification>,
) {
  future::join_all(
    notifications
      .into_iter()
      .map(|notification| deliver(notifier, notification)),
  )
  .await;
}

/// Records notifications in the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn send(&self, notification: Notification) -> anyhow::Result<()> {
    info!(to = notification.recipient(), ?notification, "notification");
    Ok(())
  }
}

/// Posts each notification as JSON to a mail relay.
pub struct WebhookNotifier {
  client: Client,
  url: String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    let client = Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .unwrap_or_default();
    Self { client, url: url.into() }
  }
}

#[async_trait]
impl Notifier for WebhookNotifier {
  async fn send(&self, notification: Notification) -> anyhow::Result<()> {
    self
      .client
      .post(&self.url)
      .json(&notification)
      .send()
      .await?
      .error_for_status()?;

    debug!(to = notification.recipient(), "notification posted");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

  use super::*;
  use crate::sv::{self, test_utils::test_db};

  type Received = Arc<Mutex<Vec<json::Value>>>;

  /// Local mail relay: `/hook` records bodies, `/down` always fails.
  async fn relay() -> (String, Received) {
    let received = Received::default();
    let app = Router::new()
      .route(
        "/hook",
        post(
          |State(received): State<Received>,
           Json(body): Json<json::Value>| async move {
            received.lock().unwrap().push(body);
            StatusCode::NO_CONTENT
          },
        ),
      )
      .route("/down", post(|| async { StatusCode::BAD_GATEWAY }))
      .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (format!("http://{addr}"), received)
  }

  fn welcome() -> Notification {
    Notification::Welcome {
      name: "Ann".into(),
      email: "ann@example.com".into(),
      referral_code: "ABCD2345".into(),
    }
  }

  #[tokio::test]
  async fn test_webhook_posts_json() {
    let (base, received) = relay().await;
    let notifier = WebhookNotifier::new(format!("{base}/hook"));

    notifier.send(welcome()).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "welcome");
    assert_eq!(received[0]["email"], "ann@example.com");
    assert_eq!(received[0]["referralCode"], "ABCD2345");
  }

  #[tokio::test]
  async fn test_webhook_error_status() {
    let (base, received) = relay().await;
    let notifier = WebhookNotifier::new(format!("{base}/down"));

    assert!(notifier.send(welcome()).await.is_err());
    assert!(received.lock().unwrap().is_empty());

    // the ledger change goes through regardless
    let db = test_db::setup().await;
    let customer = test_db::customer(&db, "ann@example.com").await;
    let enrollment = sv::Referral::new(&db, &notifier)
      .enroll(customer.id, None)
      .await
      .unwrap();
    assert!(enrollment.created);
  }

  #[test]
  fn test_notification_wire_format() {
    let value = json::to_value(Notification::PayoutProcessed {
      name: "Ann".into(),
      email: "ann@example.com".into(),
      amount: Cents(5000),
      payment_method: PaymentMethod::Paypal,
      transaction_id: Some("PP-1".into()),
    })
    .unwrap();

    assert_eq!(value["event"], "payout_processed");
    assert_eq!(value["amount"], "50.00");
    assert_eq!(value["paymentMethod"], "paypal");
    assert_eq!(value["transactionId"], "PP-1");
  }
}
