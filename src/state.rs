use anyhow::Context;

use crate::{
  config::Config,
  prelude::*,
  sv::{
    self,
    notify::{LogNotifier, Notifier, WebhookNotifier},
  },
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub notifier: Arc<dyn Notifier>,
}

pub struct Services<'a> {
  pub customer: sv::Customer<'a>,
  pub order: sv::Order<'a>,
  pub referral: sv::Referral<'a>,
  pub ledger: sv::Ledger<'a>,
  pub payout: sv::Payout<'a>,
  pub settings: sv::Settings<'a>,
  pub stats: sv::Stats<'a>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(&config.database_url)
      .await
      .with_context(|| format!("Failed to open `{}`", config.database_url))?;
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
      Some(url) => {
        info!(%url, "Notifications go to webhook");
        Arc::new(WebhookNotifier::new(url.clone()))
      }
      None => Arc::new(LogNotifier),
    };

    Ok(Self { db, config, notifier })
  }

  pub fn sv(&self) -> Services<'_> {
    let db = &self.db;
    let notify = self.notifier.as_ref();
    Services {
      customer: sv::Customer::new(db),
      order: sv::Order::new(db, notify),
      referral: sv::Referral::new(db, notify),
      ledger: sv::Ledger::new(db, notify),
      payout: sv::Payout::new(db, notify),
      settings: sv::Settings::new(db),
      stats: sv::Stats::new(db, notify),
    }
  }

  /// Admin capability comes from `ADMIN_IDS` or the customer's own flag.
  pub async fn is_admin(&self, customer_id: i32) -> Result<bool> {
    if self.config.admins.contains(&customer_id) {
      return Ok(true);
    }
    self.sv().customer.is_admin(customer_id).await
  }
}

#[cfg(test)]
impl AppState {
  pub async fn for_tests(notifier: Arc<dyn Notifier>) -> Self {
    let db = sv::test_utils::test_db::setup().await;
    Self { db, config: Config::for_tests(), notifier }
  }
}
