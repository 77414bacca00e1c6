//! Tenants, their usage counters, and the subscription-window rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  plan::{PlanLimits, PlanTier},
};

// ─── Subscription window ─────────────────────────────────────────────────────

/// The half-open interval `[start, end)` during which a tenant may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl SubscriptionWindow {
  /// A fresh window beginning at `now` and lasting one plan duration.
  pub fn starting(now: DateTime<Utc>, limits: &PlanLimits) -> Self {
    Self { start: now, end: now + limits.duration() }
  }

  pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool { now > self.end }

  /// Whole days left in the window; zero once elapsed.
  pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
    (self.end - now).num_days().max(0)
  }
}

// ─── Usage counters ──────────────────────────────────────────────────────────

/// Per-tenant quota counters. Only ledger operations mutate these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
  pub questions_used:        u32,
  pub questions_allowed:     u32,
  pub hits_used:             u32,
  pub hits_allowed:          u32,
  pub modifications_used:    u32,
  pub modifications_allowed: u32,
}

impl Usage {
  /// Zeroed counters with the allowances of `limits`.
  pub fn with_limits(limits: &PlanLimits) -> Self {
    let mut usage = Self::default();
    usage.set_allowances(limits);
    usage
  }

  pub fn set_allowances(&mut self, limits: &PlanLimits) {
    self.questions_allowed = limits.questions_allowed;
    self.hits_allowed = limits.hits_allowed;
    self.modifications_allowed = limits.modifications_allowed;
  }

  pub fn allowances_match(&self, limits: &PlanLimits) -> bool {
    self.questions_allowed == limits.questions_allowed
      && self.hits_allowed == limits.hits_allowed
      && self.modifications_allowed == limits.modifications_allowed
  }

  pub fn hits_exhausted(&self) -> bool { self.hits_used >= self.hits_allowed }

  /// Gate for adding a corpus entry.
  pub fn check_question_room(&self) -> Result<()> {
    if self.questions_used >= self.questions_allowed {
      return Err(Error::QuestionQuotaExceeded {
        used:    self.questions_used,
        allowed: self.questions_allowed,
      });
    }
    Ok(())
  }

  /// Gate for an approved modify or delete.
  pub fn check_modification_room(&self) -> Result<()> {
    if self.modifications_used >= self.modifications_allowed {
      return Err(Error::ModificationQuotaExceeded {
        used:    self.modifications_used,
        allowed: self.modifications_allowed,
      });
    }
    Ok(())
  }
}

// ─── Tenant ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
  pub tenant_id:   Uuid,
  pub name:        String,
  pub email:       String,
  /// Unique routing key used by the public query surface.
  pub website_key: String,
  pub plan:        PlanTier,
  pub window:      SubscriptionWindow,
  pub usage:       Usage,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
}

impl Tenant {
  /// Compute the effect of moving this tenant onto `plan`.
  ///
  /// - A new cycle, or any move onto the trial tier, starts a fresh window.
  /// - A renewal after the window lapsed also starts fresh.
  /// - A renewal inside the window stacks: `end` grows by one duration and
  ///   `start` is kept.
  ///
  /// Leaving the trial tier for a paid tier resets all usage counters.
  pub fn plan_change(
    &self,
    plan: PlanTier,
    is_new_cycle: bool,
    now: DateTime<Utc>,
  ) -> PlanChange {
    let limits = plan.limits();
    let window = if is_new_cycle
      || plan.is_trial()
      || self.window.has_elapsed(now)
    {
      SubscriptionWindow::starting(now, &limits)
    } else {
      SubscriptionWindow {
        start: self.window.start,
        end:   self.window.end + limits.duration(),
      }
    };

    PlanChange {
      previous: self.plan,
      plan,
      limits,
      window,
      reset_usage: self.plan.is_trial() && !plan.is_trial(),
    }
  }

  pub fn apply(&mut self, change: &PlanChange) {
    self.plan = change.plan;
    self.window = change.window;
    self.usage.set_allowances(&change.limits);
    if change.reset_usage {
      self.usage.questions_used = 0;
      self.usage.hits_used = 0;
      self.usage.modifications_used = 0;
    }
  }
}

/// The outcome of [`Tenant::plan_change`], applied atomically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanChange {
  pub previous:    PlanTier,
  pub plan:        PlanTier,
  pub limits:      PlanLimits,
  pub window:      SubscriptionWindow,
  pub reset_usage: bool,
}

/// Input to [`crate::store::QnaStore::create_tenant`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
  pub name:        String,
  pub email:       String,
  pub website_key: String,
}

impl NewTenant {
  pub fn validate(&self) -> Result<()> {
    if self.website_key.trim().is_empty() {
      return Err(Error::Validation("website_key must not be empty".into()));
    }
    if self.name.trim().is_empty() {
      return Err(Error::Validation("name must not be empty".into()));
    }
    Ok(())
  }
}
