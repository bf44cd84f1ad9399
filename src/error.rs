use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::DbErr;

use crate::utils::Cents;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("database error: {0}")]
  Db(#[from] DbErr),
  #[error("customer not found")]
  CustomerNotFound,
  #[error("customer is not an affiliate")]
  NotAffiliate,
  #[error("order not found")]
  OrderNotFound,
  #[error("payout not found")]
  PayoutNotFound,
  #[error("commission transaction not found")]
  TransactionNotFound,
  #[error("insufficient commission balance")]
  InsufficientBalance,
  #[error("minimum payout amount is ${0}")]
  BelowMinimumPayout(Cents),
  #[error("{0}")]
  InvalidArgs(String),
  #[error("{0}")]
  InvalidState(String),
  #[error("unable to generate a unique referral code")]
  ReferralCodeExhausted,
  #[error("affiliate program is not active")]
  ProgramInactive,
  #[error("authentication required")]
  Unauthorized,
  #[error("access denied")]
  Forbidden,
  #[error("concurrent update: {0}")]
  Conflict(String),
  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Error::Db(_) | Error::Internal(_) | Error::ReferralCodeExhausted => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::CustomerNotFound
      | Error::NotAffiliate
      | Error::OrderNotFound
      | Error::PayoutNotFound
      | Error::TransactionNotFound => StatusCode::NOT_FOUND,
      Error::InsufficientBalance | Error::BelowMinimumPayout(_) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::InvalidState(_) | Error::Conflict(_) => StatusCode::CONFLICT,
      Error::ProgramInactive | Error::Forbidden => StatusCode::FORBIDDEN,
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
    }
  }

  /// Message safe to show to API clients.
  pub fn user_message(&self) -> String {
    match self {
      Error::Db(_) | Error::Internal(_) => "Internal server error".into(),
      other => other.to_string(),
    }
  }

  pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_)))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }

    let body = Json(json::json!({
      "error": self.user_message(),
      "status": status.as_u16(),
    }));

    (status, body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_codes() {
    assert_eq!(Error::PayoutNotFound.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
      Error::InsufficientBalance.status_code(),
      StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
      Error::InvalidArgs("bad".into()).status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      Error::Conflict("payout".into()).status_code(),
      StatusCode::CONFLICT
    );
  }

  #[test]
  fn test_minimum_payout_message() {
    let err = Error::BelowMinimumPayout(Cents(5000));
    assert_eq!(err.to_string(), "minimum payout amount is $50.00");
  }

  #[test]
  fn test_db_errors_are_hidden() {
    let err = Error::Db(DbErr::Custom("disk I/O error".into()));
    assert_eq!(err.user_message(), "Internal server error");
    assert_eq!(
      err.into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
