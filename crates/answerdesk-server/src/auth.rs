//! HTTP Basic-auth identity provider.
//!
//! Users come from `[[users]]` in the configuration, each with an argon2
//! PHC hash. A verified login resolves to a [`Caller`] carrying the
//! configured role and tenant.

use std::collections::HashMap;

use answerdesk_core::identity::{Caller, IdentityProvider, Role};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::{Error, UserConfig};

pub struct BasicAuthIdentity {
  users: HashMap<String, UserConfig>,
}

impl BasicAuthIdentity {
  /// Check every user up front so a bad entry fails startup, not logins.
  pub fn new(users: Vec<UserConfig>) -> Result<Self, Error> {
    let mut by_name = HashMap::with_capacity(users.len());
    for user in users {
      let invalid = |reason: &str| Error::InvalidUser {
        username: user.username.clone(),
        reason:   reason.to_owned(),
      };
      PasswordHash::new(&user.password_hash).map_err(|_| invalid("password_hash is not a PHC string"))?;
      match (user.role, user.tenant_id) {
        (Role::Tenant | Role::Staff, None) => return Err(invalid("tenant and staff users need a tenant_id")),
        (Role::Operator, Some(_)) => return Err(invalid("operators do not belong to a tenant")),
        _ => {}
      }
      if by_name.contains_key(&user.username) {
        return Err(invalid("listed twice"));
      }
      by_name.insert(user.username.clone(), user);
    }
    Ok(Self { users: by_name })
  }

  pub fn len(&self) -> usize { self.users.len() }

  pub fn is_empty(&self) -> bool { self.users.is_empty() }

  fn verify(&self, header_val: &str) -> Option<Caller> {
    let encoded = header_val.strip_prefix("Basic ")?;
    let decoded = B64.decode(encoded).ok()?;
    let creds = std::str::from_utf8(&decoded).ok()?;
    let (username, password) = creds.split_once(':')?;

    let user = self.users.get(username)?;
    let parsed_hash = PasswordHash::new(&user.password_hash).ok()?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed_hash)
      .ok()?;

    Some(Caller { user_id: user.username.clone(), role: user.role, tenant_id: user.tenant_id })
  }
}

impl IdentityProvider for BasicAuthIdentity {
  fn resolve(&self, credential: &str) -> Option<Caller> {
    let caller = self.verify(credential);
    if caller.is_none() {
      tracing::debug!("basic auth rejected");
    }
    caller
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;
  use uuid::Uuid;

  use super::*;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn user(name: &str, password: &str, role: Role, tenant_id: Option<Uuid>) -> UserConfig {
    UserConfig { username: name.into(), password_hash: hash(password), role, tenant_id }
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials_resolve_role_and_tenant() {
    let tenant = Uuid::new_v4();
    let identity = BasicAuthIdentity::new(vec![
      user("ops", "secret", Role::Operator, None),
      user("shop", "hunter2", Role::Tenant, Some(tenant)),
    ])
    .unwrap();

    let ops = identity.resolve(&basic("ops", "secret")).unwrap();
    assert_eq!(ops, Caller::operator("ops"));

    let shop = identity.resolve(&basic("shop", "hunter2")).unwrap();
    assert_eq!(shop.role, Role::Tenant);
    assert_eq!(shop.tenant_id, Some(tenant));
  }

  #[test]
  fn wrong_password() {
    let identity = BasicAuthIdentity::new(vec![user("ops", "secret", Role::Operator, None)]).unwrap();
    assert!(identity.resolve(&basic("ops", "wrong")).is_none());
    assert!(identity.resolve(&basic("nobody", "secret")).is_none());
  }

  #[test]
  fn malformed_headers() {
    let identity = BasicAuthIdentity::new(vec![user("ops", "secret", Role::Operator, None)]).unwrap();
    assert!(identity.resolve("Basic !!!not-base64!!!").is_none());
    assert!(identity.resolve("Bearer abc").is_none());
    assert!(identity.resolve(&format!("Basic {}", B64.encode("no-colon"))).is_none());
  }

  #[test]
  fn tenant_users_need_a_tenant() {
    let err = BasicAuthIdentity::new(vec![user("shop", "pw", Role::Staff, None)]);
    assert!(matches!(err, Err(Error::InvalidUser { .. })));
  }

  #[test]
  fn bad_hash_fails_startup() {
    let mut bad = user("ops", "pw", Role::Operator, None);
    bad.password_hash = "plaintext".into();
    assert!(matches!(BasicAuthIdentity::new(vec![bad]), Err(Error::InvalidUser { .. })));
  }
}
