use crate::{entity::customer, prelude::*};

pub struct Customer<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Customer<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get_or_create(
    &self,
    email: &str,
    name: &str,
  ) -> Result<customer::Model> {
    let email = email.trim().to_lowercase();
    if let Some(customer) = self.by_email(&email).await? {
      return Ok(customer);
    }

    let now = now();
    let customer = customer::ActiveModel {
      id: NotSet,
      email: Set(email),
      name: Set(name.trim().to_string()),
      is_admin: Set(false),
      referral_code: Set(None),
      referred_by: Set(None),
      commission_rate: Set(1000),
      payment_method: Set(None),
      payment_email: Set(None),
      bank_details: Set(None),
      stripe_account_id: Set(None),
      affiliate_since: Set(None),
      created_at: Set(now),
      updated_at: Set(now),
    };

    Ok(customer.insert(self.db).await?)
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<customer::Model>> {
    Ok(customer::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i32) -> Result<customer::Model> {
    self.by_id(id).await?.ok_or(Error::CustomerNotFound)
  }

  pub async fn by_email(&self, email: &str) -> Result<Option<customer::Model>> {
    Ok(
      customer::Entity::find()
        .filter(customer::Column::Email.eq(email.trim().to_lowercase()))
        .one(self.db)
        .await?,
    )
  }

  pub async fn set_admin(&self, id: i32, is_admin: bool) -> Result<()> {
    let customer = self.get(id).await?;

    customer::ActiveModel {
      is_admin: Set(is_admin),
      updated_at: Set(now()),
      ..customer.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }

  pub async fn is_admin(&self, id: i32) -> Result<bool> {
    Ok(self.by_id(id).await?.is_some_and(|c| c.is_admin))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_get_or_create_is_keyed_by_email() {
    let db = test_db::setup().await;
    let sv = Customer::new(&db);

    let first = sv.get_or_create("Ann@Example.com", "Ann").await.unwrap();
    let second = sv.get_or_create("ann@example.com ", "Ann B").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.email, "ann@example.com");
    assert!(!first.is_affiliate());
    assert_eq!(first.commission_rate, 1000);
  }

  #[tokio::test]
  async fn test_set_admin() {
    let db = test_db::setup().await;
    let sv = Customer::new(&db);

    let customer = sv.get_or_create("root@example.com", "Root").await.unwrap();
    assert!(!sv.is_admin(customer.id).await.unwrap());

    sv.set_admin(customer.id, true).await.unwrap();
    assert!(sv.is_admin(customer.id).await.unwrap());
    assert!(!sv.is_admin(9999).await.unwrap());
  }
}
