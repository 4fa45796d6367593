//! Guest contribution records and badge rules.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Display name used when a known guest never told us their name.
pub const ANONYMOUS_GUEST_NAME: &str = "Anonymous guest";

/// Badge awarded once a guest reaches `threshold` uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BadgeRule {
    pub id: String,
    pub threshold: u64,
}

impl BadgeRule {
    pub fn new(id: impl Into<String>, threshold: u64) -> Self {
        Self {
            id: id.into(),
            threshold,
        }
    }

    pub fn defaults() -> Vec<BadgeRule> {
        vec![
            BadgeRule::new("first_moment", 1),
            BadgeRule::new("enthusiast", 3),
            BadgeRule::new("star", 5),
        ]
    }
}

/// Per-guest, per-album upload ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GuestContribution {
    pub guest_id: String,
    pub display_name: String,
    pub total_uploads: u64,
    #[serde(default)]
    pub scene_breakdown: BTreeMap<String, u64>,
    /// Only ever grows, even when photos are later rejected.
    #[serde(default)]
    pub badges: BTreeSet<String>,
    pub last_upload_at: Option<DateTime<Utc>>,
}

impl GuestContribution {
    pub fn new(guest_id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            guest_id: guest_id.into(),
            display_name: display_name.unwrap_or_else(|| ANONYMOUS_GUEST_NAME.to_string()),
            total_uploads: 0,
            scene_breakdown: BTreeMap::new(),
            badges: BTreeSet::new(),
            last_upload_at: None,
        }
    }

    /// Count one upload and award any badges now earned.
    ///
    /// Returns the badges granted by this call.
    pub fn record_upload(
        &mut self,
        scene: &str,
        rules: &[BadgeRule],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        self.total_uploads += 1;
        *self.scene_breakdown.entry(scene.to_string()).or_insert(0) += 1;
        self.last_upload_at = Some(now);

        rules
            .iter()
            .filter(|rule| self.total_uploads >= rule.threshold)
            .filter_map(|rule| {
                self.badges
                    .insert(rule.id.clone())
                    .then(|| rule.id.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badges_awarded_at_thresholds() {
        let rules = BadgeRule::defaults();
        let mut guest = GuestContribution::new("g1", None);
        let now = Utc::now();

        assert_eq!(guest.record_upload("party", &rules, now), vec!["first_moment"]);
        assert!(guest.record_upload("party", &rules, now).is_empty());
        assert_eq!(guest.record_upload("ceremony", &rules, now), vec!["enthusiast"]);
        guest.record_upload("party", &rules, now);
        assert_eq!(guest.record_upload("party", &rules, now), vec!["star"]);

        assert_eq!(guest.total_uploads, 5);
        assert_eq!(guest.scene_breakdown.get("party"), Some(&4));
        assert_eq!(guest.badges.len(), 3);
        assert_eq!(guest.display_name, ANONYMOUS_GUEST_NAME);
    }
}
