//! Gallery metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Completed uploads by uploader kind and media kind.
    pub const UPLOADS_TOTAL: &str = "momentos_uploads_total";

    /// Rejected or failed uploads by reason.
    pub const UPLOAD_FAILURES_TOTAL: &str = "momentos_upload_failures_total";

    /// Original upload sizes in bytes.
    pub const UPLOAD_BYTES: &str = "momentos_upload_bytes";

    /// Albums that switched compression on.
    pub const COMPRESSION_LATCHED_TOTAL: &str = "momentos_compression_latched_total";

    /// Tokens issued by kind.
    pub const TOKENS_ISSUED_TOTAL: &str = "momentos_tokens_issued_total";

    /// Moderation decisions by resulting status.
    pub const MODERATION_ACTIONS_TOTAL: &str = "momentos_moderation_actions_total";

    /// Badges awarded to guests.
    pub const BADGES_GRANTED_TOTAL: &str = "momentos_badges_granted_total";
}

pub fn record_upload(uploader_kind: &str, media_kind: &str, original_bytes: u64) {
    counter!(
        names::UPLOADS_TOTAL,
        "uploader_kind" => uploader_kind.to_string(),
        "media_kind" => media_kind.to_string()
    )
    .increment(1);

    histogram!(names::UPLOAD_BYTES).record(original_bytes as f64);
}

pub fn record_upload_failure(reason: &'static str) {
    counter!(names::UPLOAD_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_compression_latched() {
    counter!(names::COMPRESSION_LATCHED_TOTAL).increment(1);
}

pub fn record_token_issued(kind: &str) {
    counter!(names::TOKENS_ISSUED_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn record_moderation(status: &str) {
    counter!(names::MODERATION_ACTIONS_TOTAL, "status" => status.to_string()).increment(1);
}

pub fn record_badges(count: usize) {
    if count > 0 {
        counter!(names::BADGES_GRANTED_TOTAL).increment(count as u64);
    }
}
