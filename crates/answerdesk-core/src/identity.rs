//! Caller identity as resolved by an external identity provider.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  /// Runs the service; approves requests and manages tenants.
  Operator,
  /// The paying customer.
  Tenant,
  /// Delegated staff acting on a tenant's behalf.
  Staff,
}

/// An authenticated principal. The core trusts this resolution as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
  pub user_id:   String,
  pub role:      Role,
  /// Set for tenant and staff callers.
  pub tenant_id: Option<Uuid>,
}

impl Caller {
  pub fn operator(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), role: Role::Operator, tenant_id: None }
  }

  pub fn require_operator(&self) -> Result<()> {
    if self.role != Role::Operator {
      return Err(Error::Forbidden("operator role required".into()));
    }
    Ok(())
  }

  /// The tenant a tenant or staff caller acts for.
  pub fn tenant_scope(&self) -> Result<Uuid> {
    match (self.role, self.tenant_id) {
      (Role::Tenant | Role::Staff, Some(id)) => Ok(id),
      (Role::Operator, _) => {
        Err(Error::Forbidden("operators do not act within a tenant scope".into()))
      }
      (_, None) => Err(Error::Forbidden(format!("{} {} has no tenant", self.role, self.user_id))),
    }
  }

  /// The inbox this caller reads notifications from.
  pub fn inbox(&self) -> String {
    match (self.role, self.tenant_id) {
      (Role::Operator, _) => crate::notify::OPERATORS_INBOX.to_owned(),
      (_, Some(id)) => id.to_string(),
      (_, None) => self.user_id.clone(),
    }
  }
}

/// Resolves a raw credential (e.g. an `Authorization` header value) to a
/// [`Caller`]. Returns `None` if the credential is not recognised.
pub trait IdentityProvider: Send + Sync {
  fn resolve(&self, credential: &str) -> Option<Caller>;
}
