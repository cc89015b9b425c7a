//! Periodic background jobs.
//!
//! One task per job kind, each driven by its own `tokio::time::interval`.
//! Overlapping master checks for one region are skipped by the pipeline's
//! per-region lock.

use futures::future::join_all;
use sekai_master::{MasterError, PublishOutcome};
use sekai_protocol::Region;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::context::AppContext;

/// Run one master check over all regions and publish the ones that
/// advanced. Returns the advanced regions with their new data version.
pub async fn run_master_check(ctx: &AppContext) -> BTreeMap<Region, String> {
    let advanced = ctx.pipeline().check_update_all().await;

    if let Some(publisher) = ctx.publisher() {
        let publishes = advanced.iter().map(|(&region, version)| async move {
            (region, publisher.publish(region, version).await)
        });
        for (region, result) in join_all(publishes).await {
            match result {
                Ok(PublishOutcome::Pushed) => info!("{} dataset published", region.tag()),
                Ok(PublishOutcome::NoChanges) => debug!("{} dataset unchanged", region.tag()),
                Err(MasterError::NoRepository(_)) => {
                    debug!("{} has no repository to publish to", region.tag());
                }
                Err(e) => warn!("{} publish failed: {}", region.tag(), e),
            }
        }
    }
    advanced
}

/// Refresh edge cookies for every pool that needs them
pub async fn run_cookie_refresh(ctx: &AppContext) {
    let refreshes = ctx
        .pools()
        .filter(|pool| pool.profile().require_cookies)
        .map(|pool| pool.refresh_cookies());
    join_all(refreshes).await;
}

/// Run one app hash check over all regions
pub async fn run_app_hash_check(ctx: &AppContext) -> Vec<Region> {
    let updated = ctx.updater().check_all().await;
    if !updated.is_empty() {
        info!("App version updated for {:?}", updated);
    }
    updated
}

fn every<F, Fut>(ctx: &Arc<AppContext>, period: Duration, immediate: bool, job: F) -> JoinHandle<()>
where
    F: Fn(Arc<AppContext>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let start = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            job(Arc::clone(&ctx)).await;
        }
    })
}

/// Spawn every periodic job. Abort the returned handles to stop them.
pub fn spawn(ctx: &Arc<AppContext>) -> Vec<JoinHandle<()>> {
    let schedule = *ctx.schedule();
    info!(
        "Scheduling master check every {}s, cookie refresh every {}s, app hash check every {}s",
        schedule.master_check_secs, schedule.cookie_refresh_secs, schedule.app_hash_check_secs
    );

    vec![
        every(
            ctx,
            Duration::from_secs(schedule.master_check_secs.max(1)),
            true,
            |ctx| async move {
                run_master_check(&ctx).await;
            },
        ),
        // cookies were fetched during init
        every(
            ctx,
            Duration::from_secs(schedule.cookie_refresh_secs.max(1)),
            false,
            |ctx| async move { run_cookie_refresh(&ctx).await },
        ),
        every(
            ctx,
            Duration::from_secs(schedule.app_hash_check_secs.max(1)),
            true,
            |ctx| async move {
                run_app_hash_check(&ctx).await;
            },
        ),
    ]
}
