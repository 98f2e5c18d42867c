use std::{sync::Weak, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::Player;

/// Publishes the live position at a fixed interval until `token` is
/// cancelled or the player is gone. The first tick fires one interval after
/// start.
pub(super) fn spawn(player: Weak<Player>, period: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticks.tick() => {}
            }

            let Some(player) = player.upgrade() else {
                break;
            };
            if !player.publish_position(&token) {
                break;
            }
        }
    });
}
