use json::{Value, json};

use crate::{
  entity::{PaymentMethod, customer},
  prelude::*,
};

/// Where an affiliate wants to be paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDetails {
  Paypal {
    email: String,
  },
  Bank {
    account_name: String,
    account_number: String,
    routing_number: String,
    bank_name: Option<String>,
  },
  Stripe {
    account_id: String,
    email: String,
  },
}

fn field(details: &Value, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .filter_map(|key| details.get(key).and_then(Value::as_str))
    .map(str::trim)
    .find(|value| !value.is_empty())
    .map(str::to_string)
}

fn required(details: &Value, keys: &[&str]) -> Result<String> {
  field(details, keys)
    .ok_or_else(|| Error::InvalidArgs(format!("Missing payment detail `{}`", keys[0])))
}

fn email(details: &Value) -> Result<String> {
  let email = required(details, &["email"])?;
  if !email.contains('@') {
    return Err(Error::InvalidArgs(format!("Invalid email `{email}`")));
  }
  Ok(email)
}

impl PaymentDetails {
  /// Validate the method-specific `details` object sent by clients.
  pub fn parse(method: PaymentMethod, details: &Value) -> Result<Self> {
    if !details.is_object() {
      return Err(Error::InvalidArgs("Payment details must be an object".into()));
    }

    Ok(match method {
      PaymentMethod::Paypal => PaymentDetails::Paypal { email: email(details)? },
      PaymentMethod::Bank => PaymentDetails::Bank {
        account_name: required(details, &["accountName", "account_name"])?,
        account_number: required(details, &["accountNumber", "account_number"])?,
        routing_number: required(details, &["routingNumber", "routing_number"])?,
        bank_name: field(details, &["bankName", "bank_name"]),
      },
      PaymentMethod::Stripe => PaymentDetails::Stripe {
        account_id: required(details, &["accountId", "account_id"])?,
        email: email(details)?,
      },
    })
  }

  /// Payment details stored on an affiliate's account, if complete.
  pub fn from_customer(customer: &customer::Model) -> Option<Self> {
    match customer.payment_method? {
      PaymentMethod::Paypal => Some(PaymentDetails::Paypal {
        email: customer.payment_email.clone()?,
      }),
      PaymentMethod::Bank => {
        PaymentDetails::parse(PaymentMethod::Bank, customer.bank_details.as_ref()?)
          .ok()
      }
      PaymentMethod::Stripe => Some(PaymentDetails::Stripe {
        account_id: customer.stripe_account_id.clone()?,
        email: customer.payment_email.clone()?,
      }),
    }
  }

  pub fn method(&self) -> PaymentMethod {
    match self {
      PaymentDetails::Paypal { .. } => PaymentMethod::Paypal,
      PaymentDetails::Bank { .. } => PaymentMethod::Bank,
      PaymentDetails::Stripe { .. } => PaymentMethod::Stripe,
    }
  }

  pub fn email(&self) -> Option<&str> {
    match self {
      PaymentDetails::Paypal { email } | PaymentDetails::Stripe { email, .. } => {
        Some(email)
      }
      PaymentDetails::Bank { .. } => None,
    }
  }

  pub fn to_json(&self) -> Value {
    match self {
      PaymentDetails::Paypal { email } => json!({ "email": email }),
      PaymentDetails::Bank {
        account_name,
        account_number,
        routing_number,
        bank_name,
      } => json!({
        "accountName": account_name,
        "accountNumber": account_number,
        "routingNumber": routing_number,
        "bankName": bank_name,
      }),
      PaymentDetails::Stripe { account_id, email } => {
        json!({ "accountId": account_id, "email": email })
      }
    }
  }

  /// Replace the stored payment method on an affiliate, clearing the others.
  pub fn apply(&self, customer: &mut customer::ActiveModel) {
    customer.payment_method = Set(Some(self.method()));
    customer.payment_email = Set(self.email().map(str::to_string));
    customer.bank_details = Set(match self {
      PaymentDetails::Bank { .. } => Some(self.to_json()),
      _ => None,
    });
    customer.stripe_account_id = Set(match self {
      PaymentDetails::Stripe { account_id, .. } => Some(account_id.clone()),
      _ => None,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_paypal() {
    let details =
      PaymentDetails::parse(PaymentMethod::Paypal, &json!({ "email": "a@b.co" }))
        .unwrap();
    assert_eq!(details, PaymentDetails::Paypal { email: "a@b.co".into() });
    assert_eq!(details.email(), Some("a@b.co"));
  }

  #[test]
  fn test_parse_rejects_missing_fields() {
    let bank = PaymentDetails::parse(
      PaymentMethod::Bank,
      &json!({ "accountName": "Ann", "accountNumber": "123" }),
    );
    assert!(matches!(bank, Err(Error::InvalidArgs(_))));

    let paypal =
      PaymentDetails::parse(PaymentMethod::Paypal, &json!({ "email": "nope" }));
    assert!(matches!(paypal, Err(Error::InvalidArgs(_))));

    let not_object = PaymentDetails::parse(PaymentMethod::Paypal, &json!("x"));
    assert!(matches!(not_object, Err(Error::InvalidArgs(_))));
  }

  #[test]
  fn test_stripe_accepts_snake_case() {
    let details = PaymentDetails::parse(
      PaymentMethod::Stripe,
      &json!({ "account_id": "acct_1", "email": "s@b.co" }),
    )
    .unwrap();
    assert_eq!(details.method(), PaymentMethod::Stripe);
    assert_eq!(details.to_json()["accountId"], "acct_1");
  }

  #[test]
  fn test_bank_round_trips_through_customer_record() {
    let details = PaymentDetails::parse(
      PaymentMethod::Bank,
      &json!({
        "accountName": "Ann",
        "accountNumber": "123",
        "routingNumber": "456",
      }),
    )
    .unwrap();

    let now = now();
    let mut customer = customer::Model {
      id: 1,
      email: "ann@example.com".into(),
      name: "Ann".into(),
      is_admin: false,
      referral_code: Some("ABCDEFGH".into()),
      referred_by: None,
      commission_rate: 1000,
      payment_method: None,
      payment_email: None,
      bank_details: None,
      stripe_account_id: None,
      affiliate_since: Some(now),
      created_at: now,
      updated_at: now,
    };
    customer.payment_method = Some(PaymentMethod::Bank);
    customer.bank_details = Some(details.to_json());

    assert_eq!(PaymentDetails::from_customer(&customer), Some(details));
  }
}
