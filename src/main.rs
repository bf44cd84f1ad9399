mod config;
mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use anyhow::Context;
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  config::Config,
  plugins::{
    App, cron,
    server::{self, auth},
  },
  prelude::*,
  state::AppState,
};

/// `affiliate token <customer|admin> <id>` prints a signed bearer token.
fn issue_token(
  config: &Config,
  kind: &str,
  id: &str,
) -> anyhow::Result<String> {
  let id = id.parse().with_context(|| format!("Invalid id `{id}`"))?;
  let principal = match kind {
    "customer" => auth::Principal::Customer(id),
    "admin" => auth::Principal::Admin(id),
    _ => anyhow::bail!("Unknown token kind `{kind}`"),
  };
  Ok(auth::issue(&config.server_secret, principal)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let config = Config::from_env()?;

  let args: Vec<String> = std::env::args().skip(1).collect();
  if let [cmd, kind, id] = args.as_slice()
    && cmd == "token"
  {
    println!("{}", issue_token(&config, kind, id)?);
    return Ok(());
  }

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "affiliate=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting Affiliate Server v{}", env!("CARGO_PKG_VERSION"));

  if config.admins.is_empty() {
    warn!("No admins configured, only admin tokens reach admin routes");
  }

  let app = Arc::new(AppState::new(config).await?);

  App::new()
    .register(server::Plugin)
    .register(cron::AutoApprove)
    .register(cron::AutoPayout)
    .run(app);

  tokio::signal::ctrl_c().await?;
  info!("Shutting down");

  Ok(())
}
