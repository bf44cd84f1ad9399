use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use json::{Value, json};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::auth::{Admin, Auth, Signed};
use crate::{
  entity::{OrderStatus, PaymentMethod, order},
  prelude::*,
  state::AppState,
  sv::{
    ledger::TransactionView,
    order::NewOrder,
    payment::PaymentDetails,
    payout::PayoutView,
    referral::{self, TrackOutcome},
    settings::{SettingsPatch, SettingsView},
  },
};

type App = State<Arc<AppState>>;

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
  json::from_slice(body)
    .map_err(|err| Error::InvalidArgs(format!("Invalid request body: {err}")))
}

/// Like [`parse`], but an empty body gives the defaults.
fn parse_optional<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  parse(body)
}

pub async fn health() -> Json<Value> {
  Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAffiliate {
  pub customer_id: Option<i32>,
  pub payment_email: Option<String>,
}

pub async fn create_affiliate(
  State(app): App,
  auth: Auth,
  body: Bytes,
) -> Result<Json<Value>> {
  let req: CreateAffiliate = parse_optional(&body)?;
  let customer_id = req.customer_id.unwrap_or(auth.0.id());
  auth.ensure_owner(&app, customer_id).await?;

  let enrollment =
    app.sv().referral.enroll(customer_id, req.payment_email).await?;
  let message = if enrollment.created {
    "Affiliate account created successfully"
  } else {
    "Already enrolled in the affiliate program"
  };

  let link =
    referral::referral_link(&app.config.base_url, &enrollment.referral_code);

  Ok(Json(json!({
    "success": true,
    "created": enrollment.created,
    "referralCode": enrollment.referral_code,
    "referralLink": link,
    "message": message,
  })))
}

pub async fn dashboard(
  State(app): App,
  auth: Auth,
  Path(customer_id): Path<i32>,
) -> Result<impl IntoResponse> {
  auth.ensure_owner(&app, customer_id).await?;
  let dashboard =
    app.sv().stats.dashboard(customer_id, &app.config.base_url).await?;
  Ok(Json(dashboard))
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodReq {
  pub method: PaymentMethod,
  pub details: Value,
}

pub async fn update_payment_method(
  State(app): App,
  auth: Auth,
  Path(customer_id): Path<i32>,
  body: Bytes,
) -> Result<Json<Value>> {
  auth.ensure_owner(&app, customer_id).await?;

  let req: PaymentMethodReq = parse(&body)?;
  let details = PaymentDetails::parse(req.method, &req.details)?;
  app.sv().referral.update_payment_method(customer_id, &details).await?;

  Ok(Json(json!({
    "success": true,
    "message": "Payment method updated successfully",
  })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReq {
  pub amount: Cents,
  pub payment_method: Option<PaymentMethod>,
  pub payment_details: Option<Value>,
}

pub async fn request_payout(
  State(app): App,
  auth: Auth,
  Path(customer_id): Path<i32>,
  body: Bytes,
) -> Result<Json<PayoutView>> {
  auth.ensure_owner(&app, customer_id).await?;

  let req: PayoutReq = parse(&body)?;
  let details = match req.payment_method {
    Some(method) => Some(PaymentDetails::parse(
      method,
      &req.payment_details.unwrap_or_else(|| json!({})),
    )?),
    None => None,
  };

  let payout = app.sv().payout.request(customer_id, req.amount, details).await?;
  Ok(Json(payout.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackReq {
  pub referral_code: String,
  pub order_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
  success: bool,
  outcome: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  transaction: Option<TransactionView>,
}

fn track_response(outcome: &TrackOutcome) -> Response {
  let status = match outcome {
    TrackOutcome::UnknownCode | TrackOutcome::UnknownOrder => {
      StatusCode::NOT_FOUND
    }
    _ => StatusCode::OK,
  };
  let body = TrackResponse {
    success: outcome.transaction().is_some(),
    outcome: outcome.label(),
    transaction: outcome
      .transaction()
      .map(|tx| TransactionView::from((tx.clone(), None))),
  };
  (status, Json(body)).into_response()
}

pub async fn track_referral(State(app): App, body: Signed) -> Result<Response> {
  let req: TrackReq = body.json()?;
  if req.referral_code.trim().is_empty() {
    return Err(Error::InvalidArgs("Missing referral code".into()));
  }

  let outcome =
    app.sv().referral.track(&req.referral_code, req.order_id).await?;
  Ok(track_response(&outcome))
}

pub async fn settings(State(app): App) -> Result<Json<SettingsView>> {
  Ok(Json(app.sv().settings.get().await?.into()))
}

pub async fn admin_settings(
  State(app): App,
  _: Admin,
) -> Result<Json<SettingsView>> {
  Ok(Json(app.sv().settings.get_or_create().await?.into()))
}

pub async fn update_settings(
  State(app): App,
  Admin(admin): Admin,
  body: Bytes,
) -> Result<Json<SettingsView>> {
  let patch: SettingsPatch = parse(&body)?;
  let settings = app.sv().settings.update(patch).await?;
  info!(admin, "Affiliate settings updated");
  Ok(Json(settings.into()))
}

pub async fn program_stats(
  State(app): App,
  _: Admin,
) -> Result<impl IntoResponse> {
  Ok(Json(app.sv().stats.program().await?))
}

pub async fn pending_payouts(
  State(app): App,
  _: Admin,
) -> Result<impl IntoResponse> {
  Ok(Json(app.sv().payout.pending_with_affiliates().await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveReq {
  pub transaction_id: Option<String>,
}

pub async fn approve_payout(
  State(app): App,
  Admin(admin): Admin,
  Path(payout_id): Path<i32>,
  body: Bytes,
) -> Result<Json<Value>> {
  let req: ApproveReq = parse_optional(&body)?;
  let payout = app.sv().payout.approve(payout_id, req.transaction_id).await?;
  info!(admin, payout_id, "Payout approved by admin");

  Ok(Json(json!({ "success": true, "payout": PayoutView::from(payout) })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectReq {
  #[serde(alias = "reason")]
  pub notes: Option<String>,
}

pub async fn reject_payout(
  State(app): App,
  Admin(admin): Admin,
  Path(payout_id): Path<i32>,
  body: Bytes,
) -> Result<Json<Value>> {
  let req: RejectReq = parse_optional(&body)?;
  let payout = app.sv().payout.reject(payout_id, req.notes).await?;
  info!(admin, payout_id, "Payout rejected by admin");

  Ok(Json(json!({ "success": true, "payout": PayoutView::from(payout) })))
}

pub async fn process_payout(
  State(app): App,
  _: Admin,
  Path(payout_id): Path<i32>,
) -> Result<Json<Value>> {
  let payout = app.sv().payout.mark_processing(payout_id).await?;
  Ok(Json(json!({ "success": true, "payout": PayoutView::from(payout) })))
}

pub async fn cancel_commission(
  State(app): App,
  Admin(admin): Admin,
  Path(transaction_id): Path<i32>,
) -> Result<Json<Value>> {
  let tx = app.sv().ledger.cancel(transaction_id).await?;
  info!(admin, transaction_id, "Commission cancelled by admin");

  Ok(Json(json!({
    "success": true,
    "transaction": TransactionView::from((tx, None)),
  })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoApproveReq {
  pub threshold: Option<Cents>,
}

pub async fn auto_approve(
  State(app): App,
  _: Admin,
  body: Bytes,
) -> Result<Json<Value>> {
  let req: AutoApproveReq = parse_optional(&body)?;
  let approved = app.sv().ledger.auto_approve(req.threshold).await?;
  Ok(Json(json!({ "success": true, "approved": approved })))
}

pub async fn process_automatic_payouts(
  State(app): App,
  _: Admin,
) -> Result<Json<Value>> {
  let payouts: Vec<PayoutView> = app
    .sv()
    .payout
    .process_automatic()
    .await?
    .into_iter()
    .map(PayoutView::from)
    .collect();

  Ok(Json(json!({
    "success": true,
    "created": payouts.len(),
    "payouts": payouts,
  })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
  pub id: i32,
  pub customer_email: String,
  pub customer_name: String,
  pub final_amount: Cents,
  pub currency: String,
  pub status: OrderStatus,
  pub referral_code: Option<String>,
  pub created_at: DateTime,
  pub completed_at: Option<DateTime>,
}

impl From<order::Model> for OrderView {
  fn from(order: order::Model) -> Self {
    Self {
      id: order.id,
      customer_email: order.customer_email,
      customer_name: order.customer_name,
      final_amount: Cents(order.final_amount),
      currency: order.currency,
      status: order.status,
      referral_code: order.referral_code,
      created_at: order.created_at,
      completed_at: order.completed_at,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReq {
  pub customer_email: String,
  #[serde(default)]
  pub customer_name: String,
  pub final_amount: Cents,
  pub currency: Option<String>,
  pub referral_code: Option<String>,
}

pub async fn create_order(
  State(app): App,
  body: Signed,
) -> Result<(StatusCode, Json<OrderView>)> {
  let req: OrderReq = body.json()?;
  if !req.customer_email.contains('@') {
    return Err(Error::InvalidArgs("Invalid customer email".into()));
  }

  let order = app
    .sv()
    .order
    .create(NewOrder {
      customer_email: req.customer_email,
      customer_name: req.customer_name,
      final_amount: req.final_amount,
      currency: req.currency,
      referral_code: req.referral_code,
    })
    .await?;

  Ok((StatusCode::CREATED, Json(order.into())))
}

pub async fn complete_order(
  State(app): App,
  Path(order_id): Path<i32>,
  _: Signed,
) -> Result<Json<Value>> {
  let (order, outcome) = app.sv().order.complete(order_id).await?;

  Ok(Json(json!({
    "success": true,
    "order": OrderView::from(order),
    "referral": outcome.as_ref().map(TrackOutcome::label),
  })))
}

pub async fn refund_order(
  State(app): App,
  Path(order_id): Path<i32>,
  _: Signed,
) -> Result<Json<Value>> {
  let (order, cancelled) = app.sv().order.refund(order_id).await?;

  Ok(Json(json!({
    "success": true,
    "order": OrderView::from(order),
    "cancelledCommissions": cancelled,
  })))
}
