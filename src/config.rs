use std::env;

use anyhow::Context;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  /// HMAC key for bearer tokens and webhook signatures.
  pub server_secret: String,
  /// Customer ids granted admin capability regardless of `is_admin`.
  pub admins: HashSet<i32>,
  pub base_url: String,
  pub notify_webhook_url: Option<String>,
  /// Zero disables the auto-approval job.
  pub auto_approve_every: Duration,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    dotenvy::dotenv().ok();

    let admins = parse_admins(&env::var("ADMIN_IDS").unwrap_or_default())?;

    let auto_approve_every = match env::var("AUTO_APPROVE_EVERY") {
      Ok(raw) => humantime::parse_duration(raw.trim())
        .with_context(|| format!("Invalid AUTO_APPROVE_EVERY `{raw}`"))?,
      Err(_) => Duration::from_secs(6 * 3600),
    };

    Ok(Config {
      database_url: env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:affiliate.db?mode=rwc".into()),
      port: env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000),
      server_secret: env::var("SERVER_SECRET")
        .context("SERVER_SECRET not set")?,
      admins,
      base_url: env::var("BASE_URL")
        .unwrap_or_else(|_| "http://localhost:5000".into()),
      notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
        .ok()
        .filter(|url| !url.trim().is_empty()),
      auto_approve_every,
    })
  }
}

fn parse_admins(raw: &str) -> anyhow::Result<HashSet<i32>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|id| id.parse().with_context(|| format!("Invalid admin id `{id}`")))
    .collect()
}

#[cfg(test)]
impl Config {
  pub fn for_tests() -> Self {
    Config {
      database_url: "sqlite::memory:".into(),
      port: 0,
      server_secret: "test-secret".into(),
      admins: HashSet::from([1000]),
      base_url: "https://example.test".into(),
      notify_webhook_url: None,
      auto_approve_every: Duration::ZERO,
    }
  }
}
