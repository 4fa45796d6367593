//! Upload window and storage budget.
//!
//! The window closes `UPLOAD_WINDOW_DAYS` after the event date unless an
//! explicit close time is stored. Albums without an event date never close
//! on their own. Compression switches on once the byte budget is crossed and
//! stays on.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use momentos_firestore::{with_conflict_retry, AlbumScope};
use momentos_models::{
    Album, AlbumId, AlbumStatus, CleanupStatus, WeddingId, COMPRESSION_THRESHOLD_BYTES,
    RETENTION_DAYS, UPLOAD_WINDOW_DAYS,
};

use crate::albums::load_album;
use crate::context::GalleryContext;
use crate::error::GalleryResult;

const DAY_MS: f64 = 24.0 * 3600.0 * 1000.0;

/// Effective window of an album, with derived values filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowState {
    pub event_date: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub threshold_bytes: u64,
    pub compression_active: bool,
    pub cleanup_at: Option<DateTime<Utc>>,
    pub cleanup_status: CleanupStatus,
    pub archived: bool,
}

impl WindowState {
    /// True once `now` is past `closes_at`.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.closes_at.is_some_and(|closes_at| now > closes_at)
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.archived || self.closed_at.is_some() || self.has_elapsed(now)
    }

    /// Whether an upload of `incoming_bytes` must be recompressed.
    pub fn should_compress(&self, existing_bytes: u64, incoming_bytes: u64) -> bool {
        self.compression_active || existing_bytes.saturating_add(incoming_bytes) > self.threshold_bytes
    }
}

pub fn resolve_window(album: &Album) -> WindowState {
    let window = &album.upload_window;
    let event_date = album.event_date;

    let closes_at = window
        .closes_at
        .or_else(|| event_date.map(|d| d + Duration::days(UPLOAD_WINDOW_DAYS)));

    let threshold_bytes = match window.compression_threshold_bytes {
        0 => COMPRESSION_THRESHOLD_BYTES,
        t => t,
    };

    let cleanup_at = window.cleanup_at.or_else(|| match (event_date, closes_at) {
        (Some(d), _) => Some(d + Duration::days(RETENTION_DAYS)),
        (None, Some(c)) => Some(c + Duration::days((RETENTION_DAYS - UPLOAD_WINDOW_DAYS).max(0))),
        (None, None) => None,
    });

    WindowState {
        event_date,
        closes_at,
        closed_at: window.closed_at,
        threshold_bytes,
        compression_active: window.compression_active || album.counters.total_bytes >= threshold_bytes,
        cleanup_at,
        cleanup_status: window.cleanup_status,
        archived: album.is_archived(),
    }
}

/// Stamp `closed_at` the first time the closure is observed.
///
/// Returns true when the album changed.
pub fn mark_closed(album: &mut Album, now: DateTime<Utc>) -> bool {
    if album.upload_window.closed_at.is_some() {
        return false;
    }
    album.upload_window.closed_at = Some(now);
    if album.status == AlbumStatus::Active {
        album.status = AlbumStatus::Closed;
    }
    album.updated_at = now;
    true
}

/// Dashboard view of the window and the storage budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadState {
    pub window: WindowState,
    pub is_open: bool,
    pub remaining_ms: Option<i64>,
    pub remaining_days: Option<i64>,
    pub total_bytes: u64,
    pub optimized_bytes: u64,
    pub percentage_used: u32,
    pub should_compress_next: bool,
    pub cleanup_due: bool,
    pub cleanup_days_remaining: Option<i64>,
}

pub fn upload_state(album: &Album, now: DateTime<Utc>) -> UploadState {
    let window = resolve_window(album);
    let total_bytes = album.counters.total_bytes;

    let remaining_ms = window.closes_at.map(|c| (c - now).num_milliseconds());
    let cleanup_ms = window.cleanup_at.map(|c| (c - now).num_milliseconds());
    let percentage_used = ((total_bytes as f64 / window.threshold_bytes as f64) * 100.0)
        .round()
        .min(100.0) as u32;

    UploadState {
        is_open: !window.is_closed(now),
        remaining_ms,
        remaining_days: remaining_ms.map(ceil_days),
        total_bytes,
        optimized_bytes: album.counters.optimized_bytes,
        percentage_used,
        should_compress_next: window.compression_active,
        cleanup_due: window.cleanup_at.is_some_and(|c| now >= c),
        cleanup_days_remaining: cleanup_ms.map(ceil_days),
        window,
    }
}

fn ceil_days(ms: i64) -> i64 {
    (ms as f64 / DAY_MS).ceil() as i64
}

/// Window lifecycle operations.
pub struct WindowManager {
    ctx: GalleryContext,
}

impl WindowManager {
    pub fn new(ctx: GalleryContext) -> Self {
        Self { ctx }
    }

    /// Current upload state, stamping the closure if it just happened.
    pub async fn state(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        now: DateTime<Utc>,
    ) -> GalleryResult<UploadState> {
        let album = self.observe(wedding_id, album_id, now).await?;
        Ok(upload_state(&album, now))
    }

    /// Load the album and persist `closed_at` on first detection of an
    /// elapsed window.
    pub async fn observe(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        now: DateTime<Utc>,
    ) -> GalleryResult<Album> {
        let scope = self.ctx.scope(wedding_id, album_id);
        let album = load_album(&scope, now).await?;
        let window = resolve_window(&album.value);
        if !window.has_elapsed(now) || window.closed_at.is_some() || !album.is_stored() {
            return Ok(album.value);
        }

        with_conflict_retry(&self.ctx.config.transaction_retry, "window.mark_closed", |_| {
            self.stamp_closed(&scope, now)
        })
        .await
    }

    async fn stamp_closed(&self, scope: &AlbumScope, now: DateTime<Utc>) -> GalleryResult<Album> {
        let mut album = load_album(scope, now).await?;
        if mark_closed(&mut album.value, now) {
            scope.store.commit(vec![scope.albums().write(&album)]).await?;
            info!(
                wedding_id = %scope.wedding_id,
                album_id = %scope.album_id,
                "Upload window closed"
            );
        }
        Ok(album.value)
    }

    /// Recompute the window from a new event date, or clear it.
    pub async fn sync_event_date(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        event_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> GalleryResult<Album> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "window.sync_event_date", |_| {
            self.sync_once(&scope, event_date, now)
        })
        .await
    }

    async fn sync_once(
        &self,
        scope: &AlbumScope,
        event_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> GalleryResult<Album> {
        let mut album = load_album(scope, now).await?;
        apply_event_date(&mut album.value, event_date, now);
        scope.store.commit(vec![scope.albums().write(&album)]).await?;

        info!(
            wedding_id = %scope.wedding_id,
            album_id = %scope.album_id,
            event_date = ?event_date,
            closes_at = ?album.value.upload_window.closes_at,
            "Album event date synced"
        );
        Ok(album.value)
    }

    /// Close the window now. Used for albums without an event date.
    pub async fn close_window(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        now: DateTime<Utc>,
    ) -> GalleryResult<Album> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "window.close", |_| {
            self.close_once(&scope, now)
        })
        .await
    }

    async fn close_once(&self, scope: &AlbumScope, now: DateTime<Utc>) -> GalleryResult<Album> {
        let mut album = load_album(scope, now).await?;
        let mut changed = mark_closed(&mut album.value, now);
        if album.value.upload_window.closes_at.map_or(true, |c| c > now) {
            album.value.upload_window.closes_at = Some(now);
            changed = true;
        }
        if changed {
            scope.store.commit(vec![scope.albums().write(&album)]).await?;
            info!(wedding_id = %scope.wedding_id, album_id = %scope.album_id, "Upload window closed manually");
        }
        Ok(album.value)
    }
}

/// Set or clear the event date and everything derived from it.
pub fn apply_event_date(album: &mut Album, event_date: Option<DateTime<Utc>>, now: DateTime<Utc>) {
    let window = &mut album.upload_window;
    match event_date {
        Some(date) => {
            let closes_at = date + Duration::days(UPLOAD_WINDOW_DAYS);
            window.closes_at = Some(closes_at);
            window.cleanup_at = Some(date + Duration::days(RETENTION_DAYS));
            if window.cleanup_status != CleanupStatus::Completed {
                window.cleanup_status = CleanupStatus::Scheduled;
            }
            if closes_at > now && window.closed_at.is_some() {
                window.closed_at = None;
                if album.status == AlbumStatus::Closed {
                    album.status = AlbumStatus::Active;
                }
            }
        }
        None => {
            window.closes_at = None;
            window.cleanup_at = None;
            window.cleanup_status = CleanupStatus::Scheduled;
        }
    }
    if window.compression_threshold_bytes == 0 {
        window.compression_threshold_bytes = COMPRESSION_THRESHOLD_BYTES;
    }
    album.event_date = event_date;
    album.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album() -> Album {
        Album::new(WeddingId::from("w1"), AlbumId::default(), Utc::now())
    }

    #[test]
    fn test_window_without_event_date_never_closes() {
        let album = album();
        let state = resolve_window(&album);
        assert!(state.closes_at.is_none());
        assert!(state.cleanup_at.is_none());
        assert!(!state.is_closed(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_window_derived_from_event_date() {
        let mut album = album();
        let event = Utc::now() - Duration::days(10);
        album.event_date = Some(event);

        let state = resolve_window(&album);
        assert_eq!(state.closes_at, Some(event + Duration::days(30)));
        assert_eq!(state.cleanup_at, Some(event + Duration::days(365)));
        assert!(!state.is_closed(Utc::now()));
        assert!(state.is_closed(event + Duration::days(31)));
    }

    #[test]
    fn test_cleanup_falls_back_to_closes_at() {
        let mut album = album();
        let closes = Utc::now();
        album.upload_window.closes_at = Some(closes);
        assert_eq!(resolve_window(&album).cleanup_at, Some(closes + Duration::days(335)));
    }

    #[test]
    fn test_compression_active_from_bytes_or_latch() {
        let mut album = album();
        album.upload_window.compression_threshold_bytes = 100;
        assert!(!resolve_window(&album).compression_active);
        assert!(resolve_window(&album).should_compress(60, 60));
        assert!(!resolve_window(&album).should_compress(40, 60));

        album.counters.total_bytes = 100;
        assert!(resolve_window(&album).compression_active);

        album.counters.total_bytes = 0;
        album.upload_window.compression_active = true;
        assert!(resolve_window(&album).should_compress(0, 1));
    }

    #[test]
    fn test_mark_closed_is_idempotent() {
        let mut album = album();
        let first = Utc::now();
        assert!(mark_closed(&mut album, first));
        assert!(!mark_closed(&mut album, first + Duration::hours(1)));
        assert_eq!(album.upload_window.closed_at, Some(first));
        assert_eq!(album.status, AlbumStatus::Closed);
    }

    #[test]
    fn test_apply_event_date_reopens_and_clears() {
        let mut album = album();
        let now = Utc::now();
        mark_closed(&mut album, now);
        album.upload_window.cleanup_status = CleanupStatus::Completed;

        apply_event_date(&mut album, Some(now), now);
        assert_eq!(album.upload_window.closes_at, Some(now + Duration::days(30)));
        assert!(album.upload_window.closed_at.is_none());
        assert_eq!(album.status, AlbumStatus::Active);
        assert_eq!(album.upload_window.cleanup_status, CleanupStatus::Completed);

        apply_event_date(&mut album, None, now);
        assert!(album.event_date.is_none());
        assert!(album.upload_window.closes_at.is_none());
        assert!(album.upload_window.cleanup_at.is_none());
    }

    #[test]
    fn test_upload_state_percentages_and_days() {
        let mut album = album();
        let now = Utc::now();
        album.upload_window.compression_threshold_bytes = 200;
        album.counters.total_bytes = 50;
        album.upload_window.closes_at = Some(now + Duration::hours(36));

        let state = upload_state(&album, now);
        assert!(state.is_open);
        assert_eq!(state.percentage_used, 25);
        assert_eq!(state.remaining_days, Some(2));
        assert!(!state.should_compress_next);
        assert!(!state.cleanup_due);

        album.counters.total_bytes = 500;
        let state = upload_state(&album, now + Duration::days(400));
        assert!(!state.is_open);
        assert_eq!(state.percentage_used, 100);
        assert!(state.should_compress_next);
        assert!(state.cleanup_due);
    }
}
