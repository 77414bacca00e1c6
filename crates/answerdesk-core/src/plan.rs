//! The plan catalog, a pure lookup from plan tier to its limits.
//!
//! Metering is hit-based: each plan grants a number of corpus entries, a
//! number of successfully matched visitor queries, and a number of approved
//! modify/delete requests per billing cycle.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};

/// A subscription tier. Stored as its lowercase tag.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanTier {
  #[default]
  Trial,
  Monthly,
  Quarterly,
  Yearly,
}

impl PlanTier {
  /// Resolve a stored or user-supplied tag. Unrecognised tags fall back to
  /// the trial tier.
  pub fn from_tag(tag: &str) -> Self {
    tag.trim().to_ascii_lowercase().parse().unwrap_or_default()
  }

  pub fn is_trial(self) -> bool { self == Self::Trial }

  pub fn limits(self) -> PlanLimits {
    match self {
      Self::Trial => PlanLimits {
        questions_allowed:     5,
        hits_allowed:          50,
        modifications_allowed: 0,
        duration_days:         2,
      },
      Self::Monthly => PlanLimits {
        questions_allowed:     15,
        hits_allowed:          100,
        modifications_allowed: 10,
        duration_days:         30,
      },
      Self::Quarterly => PlanLimits {
        questions_allowed:     70,
        hits_allowed:          400,
        modifications_allowed: 40,
        duration_days:         90,
      },
      Self::Yearly => PlanLimits {
        questions_allowed:     150,
        hits_allowed:          1200,
        modifications_allowed: 150,
        duration_days:         365,
      },
    }
  }
}

/// Allowances granted by a plan for one billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
  pub questions_allowed:     u32,
  pub hits_allowed:          u32,
  pub modifications_allowed: u32,
  pub duration_days:         i64,
}

impl PlanLimits {
  pub fn duration(&self) -> Duration { Duration::days(self.duration_days) }
}

/// One row of the public plan listing.
#[derive(Debug, Clone, Serialize)]
pub struct PlanListing {
  pub plan:   PlanTier,
  #[serde(flatten)]
  pub limits: PlanLimits,
}

/// Every plan with its limits, cheapest first.
pub fn catalog() -> Vec<PlanListing> {
  PlanTier::iter()
    .map(|plan| PlanListing { plan, limits: plan.limits() })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_tags_fall_back_to_trial() {
    assert_eq!(PlanTier::from_tag("platinum"), PlanTier::Trial);
    assert_eq!(PlanTier::from_tag(""), PlanTier::Trial);
  }

  #[test]
  fn tags_are_case_insensitive() {
    assert_eq!(PlanTier::from_tag("Yearly"), PlanTier::Yearly);
    assert_eq!(PlanTier::from_tag(" monthly "), PlanTier::Monthly);
  }

  #[test]
  fn tag_text_matches_serde() {
    assert_eq!(PlanTier::Quarterly.as_ref(), "quarterly");
    assert_eq!(
      serde_json::to_string(&PlanTier::Quarterly).unwrap(),
      "\"quarterly\""
    );
  }

  #[test]
  fn trial_grants_no_modifications() {
    let limits = PlanTier::Trial.limits();
    assert_eq!(limits.questions_allowed, 5);
    assert_eq!(limits.modifications_allowed, 0);
    assert_eq!(limits.duration(), Duration::days(2));
  }

  #[test]
  fn catalog_lists_every_tier_in_order() {
    let plans: Vec<_> = catalog().into_iter().map(|p| p.plan).collect();
    assert_eq!(plans, vec![
      PlanTier::Trial,
      PlanTier::Monthly,
      PlanTier::Quarterly,
      PlanTier::Yearly
    ]);
  }
}
