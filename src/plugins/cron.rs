use async_trait::async_trait;
use tokio::time;

use crate::{plugins::Plugin, prelude::*, state::AppState, sv};

/// Approves pending commissions above the configured threshold.
pub struct AutoApprove;

impl AutoApprove {
  async fn tick(app: &AppState) -> Result<Option<u64>> {
    let settings = sv::settings::load(&app.db).await?;
    if !settings.is_active || !settings.auto_approval_enabled {
      return Ok(None);
    }
    app.sv().ledger.auto_approve(None).await.map(Some)
  }
}

#[async_trait]
impl Plugin for AutoApprove {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.auto_approve_every;
    if every.is_zero() {
      info!("Auto-approval disabled via config");
      return Ok(());
    }

    info!(
      "Auto-approval started (Interval: {})",
      humantime::format_duration(every)
    );

    let mut interval = time::interval(every);
    loop {
      interval.tick().await;

      match Self::tick(&app).await {
        Ok(Some(approved)) => debug!(approved, "Auto-approval run finished"),
        Ok(None) => trace!("Auto-approval disabled in settings"),
        Err(err) => error!("Auto-approval failed: {err}"),
      }
    }
  }
}

/// Turns approved balances into payouts every payout period.
pub struct AutoPayout;

impl AutoPayout {
  /// Wait before the next run; default frequency if settings can't be read.
  async fn period(app: &AppState) -> Duration {
    let frequency = match sv::settings::load(&app.db).await {
      Ok(settings) => settings.payout_frequency,
      Err(err) => {
        let fallback = sv::settings::defaults().payout_frequency;
        error!(?fallback, "Failed to load payout frequency: {err}");
        fallback
      }
    };

    let period = frequency.period();
    info!(
      ?frequency,
      "Next automatic payout run in {}",
      humantime::format_duration(period)
    );
    period
  }

  async fn tick(app: &AppState) -> Result<Option<usize>> {
    let settings = sv::settings::load(&app.db).await?;
    if !settings.is_active {
      return Ok(None);
    }
    let created = app.sv().payout.process_automatic().await?;
    Ok(Some(created.len()))
  }
}

#[async_trait]
impl Plugin for AutoPayout {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    loop {
      // re-read so a frequency change applies from the next run
      time::sleep(Self::period(&app).await).await;

      match Self::tick(&app).await {
        Ok(Some(created)) => info!(created, "Automatic payouts created"),
        Ok(None) => {
          info!("Affiliate program inactive, skipping automatic payouts")
        }
        Err(err) => error!("Automatic payouts failed: {err}"),
      }
    }
  }
}
