//! Google Ad Manager rewarded slot, shown at most once per cap window.

use crate::ads::{AdQueue, GoogleTagCommand};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// The rewarded ad is shown again only once this many minutes have passed.
pub const REWARDED_CAP_MINUTES: i64 = 10;

/// Whether the cap window since `last_shown` has elapsed at `now`.
pub fn rewarded_due(last_shown: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_shown {
        None => true,
        Some(at) => now - at > Duration::minutes(REWARDED_CAP_MINUTES),
    }
}

/// Queue the rewarded slot definition and display call.
///
/// Returns the new "last shown" timestamp when the ad was queued, `None`
/// while still capped.
pub fn queue_rewarded_ad(
    queue: &dyn AdQueue,
    ad_unit_path: &str,
    last_shown: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if !rewarded_due(last_shown, now) {
        debug!(?last_shown, "Rewarded ad capped");
        return None;
    }
    let commands = [
        GoogleTagCommand::DefineOutOfPageSlot {
            ad_unit_path: ad_unit_path.to_string(),
            format: "REWARDED".to_string(),
            force_safe_frame: true,
        },
        GoogleTagCommand::EnableAsyncRendering,
        GoogleTagCommand::EnableServices,
        GoogleTagCommand::Display { ad_unit_path: ad_unit_path.to_string() },
    ];
    for command in commands {
        queue.push_google_tag_command(command);
    }
    info!(ad_unit_path, "Queued rewarded ad");
    Some(now)
}
