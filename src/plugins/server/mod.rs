pub mod auth;
mod handlers;

use std::net::SocketAddr;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub fn router(app: Arc<AppState>) -> Router {
  let affiliate = Router::new()
    .route("/create", post(handlers::create_affiliate))
    .route("/dashboard/{customer_id}", get(handlers::dashboard))
    .route(
      "/payment-method/{customer_id}",
      post(handlers::update_payment_method),
    )
    .route("/request-payout/{customer_id}", post(handlers::request_payout))
    .route("/track-referral", post(handlers::track_referral))
    .route("/settings", get(handlers::settings))
    .route(
      "/admin/settings",
      get(handlers::admin_settings).put(handlers::update_settings),
    )
    .route("/admin/stats", get(handlers::program_stats))
    .route("/admin/pending-payouts", get(handlers::pending_payouts))
    .route("/admin/approve-payout/{payout_id}", post(handlers::approve_payout))
    .route("/admin/reject-payout/{payout_id}", post(handlers::reject_payout))
    .route("/admin/process-payout/{payout_id}", post(handlers::process_payout))
    .route(
      "/admin/cancel-commission/{transaction_id}",
      post(handlers::cancel_commission),
    )
    .route("/admin/auto-approve-commissions", post(handlers::auto_approve))
    .route(
      "/admin/process-automatic-payouts",
      post(handlers::process_automatic_payouts),
    );

  let orders = Router::new()
    .route("/", post(handlers::create_order))
    .route("/{order_id}/complete", post(handlers::complete_order))
    .route("/{order_id}/refund", post(handlers::refund_order));

  Router::new()
    .route("/health", get(handlers::health))
    .nest("/affiliate", affiliate)
    .nest("/orders", orders)
    .with_state(app)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    // 100 requests per client, refilled every 9s (about 100 per 15 minutes)
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_millisecond(9_000)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let router = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP Server listening on {addr}");
    axum::serve(listener, router).await.context("HTTP server failed")
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use json::{Value, json};
  use tower::ServiceExt;

  use super::{
    auth::{self, Principal, SIGNATURE_HEADER},
    *,
  };
  use crate::{
    entity::{CommissionStatus, settings},
    sv::{
      self,
      notify::Notification,
      test_utils::{RecordingNotifier, test_db},
    },
  };

  struct TestApp {
    state: Arc<AppState>,
    notify: Arc<RecordingNotifier>,
  }

  impl TestApp {
    async fn new() -> Self {
      let notify = Arc::new(RecordingNotifier::default());
      let state = Arc::new(AppState::for_tests(notify.clone()).await);
      Self { state, notify }
    }

    fn token(&self, principal: Principal) -> String {
      auth::issue(&self.state.config.server_secret, principal).unwrap()
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
      let resp = router(self.state.clone()).oneshot(req).await.unwrap();
      let status = resp.status();
      let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
      let value = if body.is_empty() {
        Value::Null
      } else {
        json::from_slice(&body).unwrap()
      };
      (status, value)
    }

    async fn call(
      &self,
      method: &str,
      uri: &str,
      as_: Option<Principal>,
      body: Option<Value>,
    ) -> (StatusCode, Value) {
      let mut req = Request::builder().method(method).uri(uri);
      if let Some(principal) = as_ {
        req = req.header(
          header::AUTHORIZATION,
          format!("Bearer {}", self.token(principal)),
        );
      }
      let body = match body {
        Some(body) => {
          req = req.header(header::CONTENT_TYPE, "application/json");
          Body::from(body.to_string())
        }
        None => Body::empty(),
      };
      self.send(req.body(body).unwrap()).await
    }

    async fn webhook(&self, uri: &str, body: Value) -> (StatusCode, Value) {
      let body = body.to_string();
      let signature =
        auth::sign(&self.state.config.server_secret, body.as_bytes()).unwrap();
      let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap();
      self.send(req).await
    }
  }

  async fn customer(app: &TestApp, email: &str) -> i32 {
    test_db::customer(&app.state.db, email).await.id
  }

  #[tokio::test]
  async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  #[tokio::test]
  async fn test_requires_authentication() {
    let app = TestApp::new().await;
    let id = customer(&app, "ann@example.com").await;

    let (status, body) = app
      .call("GET", &format!("/affiliate/dashboard/{id}"), None, None)
      .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let req = Request::builder()
      .uri(format!("/affiliate/dashboard/{id}"))
      .header(header::AUTHORIZATION, "Bearer Y3VzdG9tZXI6MQ")
      .body(Body::empty())
      .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn test_owner_check() {
    let app = TestApp::new().await;
    let ann = customer(&app, "ann@example.com").await;
    let bob = customer(&app, "bob@example.com").await;

    let (status, _) = app
      .call("POST", "/affiliate/create", Some(Principal::Customer(ann)), None)
      .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
      .call(
        "GET",
        &format!("/affiliate/dashboard/{ann}"),
        Some(Principal::Customer(bob)),
        None,
      )
      .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
      .call(
        "POST",
        "/affiliate/create",
        Some(Principal::Customer(bob)),
        Some(json!({ "customerId": ann })),
      )
      .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // configured admins may look at any account
    let (status, _) = app
      .call(
        "GET",
        &format!("/affiliate/dashboard/{ann}"),
        Some(Principal::Customer(1000)),
        None,
      )
      .await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn test_admin_routes_require_admin() {
    let app = TestApp::new().await;
    let ann = customer(&app, "ann@example.com").await;

    for uri in ["/affiliate/admin/stats", "/affiliate/admin/pending-payouts"] {
      let (status, _) = app.call("GET", uri, None, None).await;
      assert_eq!(status, StatusCode::UNAUTHORIZED);

      let (status, _) =
        app.call("GET", uri, Some(Principal::Customer(ann)), None).await;
      assert_eq!(status, StatusCode::FORBIDDEN);

      let (status, _) =
        app.call("GET", uri, Some(Principal::Admin(1)), None).await;
      assert_eq!(status, StatusCode::OK);
    }

    sv::Customer::new(&app.state.db).set_admin(ann, true).await.unwrap();
    let (status, _) = app
      .call(
        "GET",
        "/affiliate/admin/stats",
        Some(Principal::Customer(ann)),
        None,
      )
      .await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn test_enroll_twice_returns_same_code() {
    let app = TestApp::new().await;
    let ann = customer(&app, "ann@example.com").await;
    let as_ann = Some(Principal::Customer(ann));

    let (status, first) = app
      .call(
        "POST",
        "/affiliate/create",
        as_ann,
        Some(json!({ "paymentEmail": "pay@example.com" })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);

    let code = first["referralCode"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert_eq!(
      first["referralLink"],
      format!("https://example.test/?ref={code}")
    );

    let (_, second) = app.call("POST", "/affiliate/create", as_ann, None).await;
    assert_eq!(second["created"], false);
    assert_eq!(second["referralCode"], code);
  }

  #[tokio::test]
  async fn test_track_referral_webhook() {
    let app = TestApp::new().await;
    let db = &app.state.db;

    let affiliate = test_db::affiliate(db, "ann@example.com").await;
    let code = affiliate.referral_code.clone().unwrap();
    let order =
      test_db::completed_order(db, "buyer@example.com", 10_000, None).await;

    let body = json!({ "referralCode": code, "orderId": order.id });

    // unsigned
    let req = Request::builder()
      .method("POST")
      .uri("/affiliate/track-referral")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, first) =
      app.webhook("/affiliate/track-referral", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "created");
    assert_eq!(first["transaction"]["commission"], "10.00");
    assert_eq!(first["transaction"]["status"], "pending");

    let (status, second) = app.webhook("/affiliate/track-referral", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_tracked");
    assert_eq!(second["transaction"]["id"], first["transaction"]["id"]);

    let (status, unknown) = app
      .webhook(
        "/affiliate/track-referral",
        json!({ "referralCode": "ZZZZZZZZ", "orderId": order.id }),
      )
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(unknown["outcome"], "unknown_code");
    assert_eq!(unknown["success"], false);
  }

  #[tokio::test]
  async fn test_public_settings_do_not_persist() {
    let app = TestApp::new().await;

    let (status, body) =
      app.call("GET", "/affiliate/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["defaultCommissionRate"], "10.00");
    assert_eq!(body["minPayoutAmount"], "50.00");
    assert_eq!(body["defaultRewardType"], "percentage");
    let rows = settings::Entity::find().count(&app.state.db).await.unwrap();
    assert_eq!(rows, 0);

    let admin = Some(Principal::Admin(1));
    let (status, body) = app
      .call(
        "PUT",
        "/affiliate/admin/settings",
        admin,
        Some(json!({
          "minPayoutAmount": "25.00",
          "autoApprovalEnabled": true,
        })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minPayoutAmount"], "25.00");
    assert_eq!(body["autoApprovalEnabled"], true);

    let (status, _) = app
      .call(
        "PUT",
        "/affiliate/admin/settings",
        admin,
        Some(json!({ "defaultCommissionRate": "150" })),
      )
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_order_flow_and_payout_settlement() {
    let app = TestApp::new().await;
    let db = &app.state.db;

    let affiliate = test_db::affiliate(db, "ann@example.com").await;
    let code = affiliate.referral_code.clone().unwrap();
    let as_ann = Some(Principal::Customer(affiliate.id));
    let admin = Some(Principal::Admin(1));

    for i in 0..3 {
      let (status, order) = app
        .webhook(
          "/orders",
          json!({
            "customerEmail": format!("buyer{i}@example.com"),
            "customerName": "Buyer",
            "finalAmount": "200.00",
            "referralCode": code,
          }),
        )
        .await;
      assert_eq!(status, StatusCode::CREATED);

      let id = order["id"].as_i64().unwrap();
      let (status, done) =
        app.webhook(&format!("/orders/{id}/complete"), json!({})).await;
      assert_eq!(status, StatusCode::OK);
      assert_eq!(done["referral"], "created");
    }

    let (status, body) = app
      .call(
        "POST",
        &format!("/affiliate/request-payout/{}", affiliate.id),
        as_ann,
        Some(json!({ "amount": "70.00" })),
      )
      .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient commission balance");

    let (status, body) = app
      .call(
        "POST",
        &format!("/affiliate/request-payout/{}", affiliate.id),
        as_ann,
        Some(json!({ "amount": 40 })),
      )
      .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "minimum payout amount is $50.00");

    let (status, payout) = app
      .call(
        "POST",
        &format!("/affiliate/request-payout/{}", affiliate.id),
        as_ann,
        Some(json!({
          "amount": "50.00",
          "paymentMethod": "paypal",
          "paymentDetails": { "email": "ann.pay@example.com" },
        })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payout["status"], "pending");
    assert_eq!(payout["paymentEmail"], "ann.pay@example.com");

    let (_, pending) = app
      .call("GET", "/affiliate/admin/pending-payouts", admin, None)
      .await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["affiliate"]["email"], "ann@example.com");

    let payout_id = payout["id"].as_i64().unwrap();
    let (status, approved) = app
      .call(
        "POST",
        &format!("/affiliate/admin/approve-payout/{payout_id}"),
        admin,
        Some(json!({ "transactionId": "PP-9" })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["payout"]["status"], "paid");

    let (status, dashboard) = app
      .call(
        "GET",
        &format!("/affiliate/dashboard/{}", affiliate.id),
        as_ann,
        None,
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["stats"]["paidCommissions"], "50.00");
    assert_eq!(dashboard["stats"]["pendingCommissions"], "10.00");
    assert_eq!(dashboard["stats"]["totalEarnings"], "60.00");
    assert_eq!(dashboard["payoutHistory"][0]["transactionId"], "PP-9");

    let statuses: Vec<_> = dashboard["recentTransactions"]
      .as_array()
      .unwrap()
      .iter()
      .map(|tx| tx["status"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(statuses, ["pending", "paid", "paid"]);

    assert!(app.notify.sent().iter().any(|n| matches!(
      n,
      Notification::PayoutProcessed { amount: Cents(5_000), .. }
    )));

    let (status, _) = app
      .call(
        "POST",
        &format!("/affiliate/admin/approve-payout/{payout_id}"),
        admin,
        None,
      )
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn test_refund_webhook_cancels_commission() {
    let app = TestApp::new().await;
    let db = &app.state.db;

    let affiliate = test_db::affiliate(db, "ann@example.com").await;
    let tx = test_db::referred_order(db, &affiliate, 10_000).await;

    let (status, body) = app
      .webhook(&format!("/orders/{}/refund", tx.order_id), json!({}))
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "refunded");
    assert_eq!(body["cancelledCommissions"], 1);

    let tx = sv::Ledger::new(db, app.notify.as_ref()).get(tx.id).await.unwrap();
    assert_eq!(tx.status, CommissionStatus::Cancelled);
  }

  #[tokio::test]
  async fn test_admin_batch_endpoints() {
    let app = TestApp::new().await;
    let db = &app.state.db;
    let admin = Some(Principal::Admin(1));

    let affiliate = test_db::affiliate(db, "ann@example.com").await;
    test_db::referred_order(db, &affiliate, 60_000).await;
    test_db::referred_order(db, &affiliate, 5_000).await;

    let (status, body) = app
      .call("POST", "/affiliate/admin/auto-approve-commissions", admin, None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], 1);

    let (status, body) = app
      .call("POST", "/affiliate/admin/process-automatic-payouts", admin, None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 1);
    assert_eq!(body["payouts"][0]["amount"], "60.00");

    let payout_id = body["payouts"][0]["id"].as_i64().unwrap();
    let (status, body) = app
      .call(
        "POST",
        &format!("/affiliate/admin/process-payout/{payout_id}"),
        admin,
        None,
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"]["status"], "processing");

    let (status, body) = app
      .call(
        "POST",
        &format!("/affiliate/admin/reject-payout/{payout_id}"),
        admin,
        Some(json!({ "reason": "account closed" })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"]["status"], "rejected");
    assert_eq!(body["payout"]["notes"], "account closed");

    let (_, stats) =
      app.call("GET", "/affiliate/admin/stats", admin, None).await;
    assert_eq!(stats["totalAffiliates"], 1);
    assert_eq!(stats["totalCommissions"], "65.00");
    assert_eq!(stats["pendingPayouts"]["count"], 0);
  }
}
