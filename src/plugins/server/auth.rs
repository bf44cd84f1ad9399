//! Bearer tokens for customers and admins, and signed webhook bodies.
//!
//! A token is `base64("<kind>:<id>")` followed by `.` and the hex HMAC-SHA256
//! of that payload under the server secret. Webhooks carry the hex HMAC of
//! the raw body in `X-Signature`.

use axum::{
  body::Bytes,
  extract::{FromRequest, FromRequestParts, Request},
  http::{header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::{prelude::*, state::AppState};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
  Customer(i32),
  Admin(i32),
}

impl Principal {
  fn kind(self) -> &'static str {
    match self {
      Principal::Customer(_) => "customer",
      Principal::Admin(_) => "admin",
    }
  }

  pub fn id(self) -> i32 {
    match self {
      Principal::Customer(id) | Principal::Admin(id) => id,
    }
  }
}

fn mac(secret: &str) -> Result<HmacSha256> {
  HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|err| Error::Internal(format!("invalid HMAC key: {err}")))
}

pub fn sign(secret: &str, payload: &[u8]) -> Result<String> {
  let mut mac = mac(secret)?;
  mac.update(payload);
  Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature(
  secret: &str,
  payload: &[u8],
  signature: &str,
) -> Result<()> {
  let signature =
    hex::decode(signature.trim()).map_err(|_| Error::Unauthorized)?;
  let mut mac = mac(secret)?;
  mac.update(payload);
  // constant-time comparison
  mac.verify_slice(&signature).map_err(|_| Error::Unauthorized)
}

pub fn issue(secret: &str, principal: Principal) -> Result<String> {
  let payload =
    URL_SAFE_NO_PAD.encode(format!("{}:{}", principal.kind(), principal.id()));
  let signature = sign(secret, payload.as_bytes())?;
  Ok(format!("{payload}.{signature}"))
}

pub fn verify(secret: &str, token: &str) -> Result<Principal> {
  let (payload, signature) = token.split_once('.').ok_or(Error::Unauthorized)?;
  verify_signature(secret, payload.as_bytes(), signature)?;

  let decoded =
    URL_SAFE_NO_PAD.decode(payload).map_err(|_| Error::Unauthorized)?;
  let decoded = String::from_utf8(decoded).map_err(|_| Error::Unauthorized)?;
  let (kind, id) = decoded.split_once(':').ok_or(Error::Unauthorized)?;
  let id = id.parse().map_err(|_| Error::Unauthorized)?;

  match kind {
    "customer" => Ok(Principal::Customer(id)),
    "admin" => Ok(Principal::Admin(id)),
    _ => Err(Error::Unauthorized),
  }
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Auth(pub Principal);

impl Auth {
  /// Callers may act on their own account; admins on any.
  pub async fn ensure_owner(
    &self,
    app: &AppState,
    customer_id: i32,
  ) -> Result<()> {
    let caller = match self.0 {
      Principal::Admin(_) => return Ok(()),
      Principal::Customer(id) if id == customer_id => return Ok(()),
      Principal::Customer(id) => id,
    };

    if app.is_admin(caller).await? {
      return Ok(());
    }
    warn!(caller, customer_id, "Rejected access to another account");
    Err(Error::Forbidden)
  }
}

impl FromRequestParts<Arc<AppState>> for Auth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let token = parts
      .headers
      .get(AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.strip_prefix("Bearer "))
      .ok_or(Error::Unauthorized)?;

    Ok(Auth(verify(&app.config.server_secret, token.trim())?))
  }
}

/// Caller with admin capability.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub i32);

impl FromRequestParts<Arc<AppState>> for Admin {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    match Auth::from_request_parts(parts, app).await?.0 {
      Principal::Admin(id) => Ok(Admin(id)),
      Principal::Customer(id) => {
        if app.is_admin(id).await? {
          Ok(Admin(id))
        } else {
          Err(Error::Forbidden)
        }
      }
    }
  }
}

/// Request body whose `X-Signature` matched.
pub struct Signed(pub Bytes);

impl Signed {
  pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
    json::from_slice(&self.0)
      .map_err(|err| Error::InvalidArgs(format!("Invalid request body: {err}")))
  }
}

impl FromRequest<Arc<AppState>> for Signed {
  type Rejection = Error;

  async fn from_request(req: Request, app: &Arc<AppState>) -> Result<Self> {
    let signature = req
      .headers()
      .get(SIGNATURE_HEADER)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string)
      .ok_or(Error::Unauthorized)?;

    let body = Bytes::from_request(req, app)
      .await
      .map_err(|err| Error::InvalidArgs(err.body_text()))?;

    verify_signature(&app.config.server_secret, &body, &signature).inspect_err(
      |_| warn!("Rejected webhook with a bad signature"),
    )?;

    Ok(Signed(body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_round_trip() {
    let token = issue("secret", Principal::Customer(42)).unwrap();
    assert_eq!(verify("secret", &token).unwrap(), Principal::Customer(42));

    let token = issue("secret", Principal::Admin(1)).unwrap();
    assert_eq!(verify("secret", &token).unwrap(), Principal::Admin(1));
  }

  #[test]
  fn test_rejects_forged_tokens() {
    let token = issue("secret", Principal::Customer(42)).unwrap();
    assert!(matches!(verify("other", &token), Err(Error::Unauthorized)));

    // the unsigned `type:id` form is not accepted
    let bare = URL_SAFE_NO_PAD.encode("admin:1");
    assert!(matches!(verify("secret", &bare), Err(Error::Unauthorized)));

    let (_, signature) = token.split_once('.').unwrap();
    let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode("admin:42"));
    assert!(matches!(verify("secret", &forged), Err(Error::Unauthorized)));
  }

  #[test]
  fn test_body_signature() {
    let body = br#"{"orderId":1}"#;
    let signature = sign("secret", body).unwrap();

    assert!(verify_signature("secret", body, &signature).is_ok());
    assert!(verify_signature("secret", b"{}", &signature).is_err());
    assert!(verify_signature("secret", body, "not-hex").is_err());
  }
}
