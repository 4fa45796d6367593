//! Gallery configuration.

use momentos_firestore::RetryConfig;
use momentos_models::BadgeRule;

/// Tunables of the gallery services.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Upload-count thresholds that award badges.
    pub badge_rules: Vec<BadgeRule>,
    pub default_token_ttl_hours: i64,
    pub default_token_max_usages: u32,
    /// Longest video accepted once compression is active.
    pub max_video_secs_when_compressing: u64,
    /// Origin used in shareable guest links.
    pub share_base_url: String,
    /// Retry policy for optimistic transactions.
    pub transaction_retry: RetryConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            badge_rules: BadgeRule::defaults(),
            default_token_ttl_hours: 24,
            default_token_max_usages: 200,
            max_video_secs_when_compressing: 120,
            share_base_url: "http://localhost:3000".to_string(),
            transaction_retry: RetryConfig {
                max_retries: 10,
                base_delay_ms: 20,
                max_delay_ms: 1000,
            },
        }
    }
}

impl GalleryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            badge_rules: std::env::var("GALLERY_BADGE_THRESHOLDS")
                .ok()
                .and_then(|v| parse_badge_rules(&v))
                .unwrap_or(defaults.badge_rules),
            default_token_ttl_hours: env_or("GALLERY_TOKEN_TTL_HOURS", defaults.default_token_ttl_hours),
            default_token_max_usages: env_or(
                "GALLERY_TOKEN_MAX_USAGES",
                defaults.default_token_max_usages,
            ),
            max_video_secs_when_compressing: env_or(
                "GALLERY_MAX_VIDEO_SECS",
                defaults.max_video_secs_when_compressing,
            ),
            share_base_url: std::env::var("GALLERY_SHARE_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.share_base_url),
            transaction_retry: RetryConfig::for_transactions(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse `id:threshold` pairs, e.g. `first_moment:1,enthusiast:3,star:5`.
///
/// Rules come back sorted by threshold. Malformed input yields `None`.
pub fn parse_badge_rules(raw: &str) -> Option<Vec<BadgeRule>> {
    let mut rules = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, threshold) = pair.split_once(':')?;
        let id = id.trim();
        let threshold: u64 = threshold.trim().parse().ok()?;
        if id.is_empty() || threshold == 0 {
            return None;
        }
        rules.push(BadgeRule::new(id, threshold));
    }
    if rules.is_empty() {
        return None;
    }
    rules.sort_by_key(|r| r.threshold);
    Some(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_badge_rules() {
        let rules = parse_badge_rules("star:5, first_moment:1,enthusiast:3").unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first_moment", "enthusiast", "star"]);

        assert!(parse_badge_rules("").is_none());
        assert!(parse_badge_rules("star").is_none());
        assert!(parse_badge_rules("star:zero").is_none());
        assert!(parse_badge_rules("star:0").is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("GALLERY_TOKEN_TTL_HOURS", "48");
        std::env::set_var("GALLERY_BADGE_THRESHOLDS", "one:1,ten:10");
        std::env::set_var("GALLERY_SHARE_BASE_URL", "https://app.example.com/");

        let config = GalleryConfig::from_env();
        assert_eq!(config.default_token_ttl_hours, 48);
        assert_eq!(config.default_token_max_usages, 200);
        assert_eq!(config.badge_rules.len(), 2);
        assert_eq!(config.share_base_url, "https://app.example.com");

        std::env::remove_var("GALLERY_TOKEN_TTL_HOURS");
        std::env::remove_var("GALLERY_BADGE_THRESHOLDS");
        std::env::remove_var("GALLERY_SHARE_BASE_URL");
    }
}
