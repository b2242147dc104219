//! Reduced private loop for rules flagged independent: capture one minimal
//! region → match → dispatch, on the rule's own cadence. Shares only the
//! activation store with the rest of the pipeline.

use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureRect, FrameSource};
use crate::models::Rule;
use crate::settings::EngineSettings;
use crate::{log_info, log_warn};

use super::activation::ActivationStore;
use super::dispatch::Dispatcher;
use super::matcher;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

pub(crate) struct IndependentLoop {
    pub rule: Arc<Rule>,
    pub store: ActivationStore,
    pub frames: Arc<dyn FrameSource>,
    pub dispatcher: Arc<Dispatcher>,
    pub settings: EngineSettings,
}

pub(crate) async fn independent_loop(ctx: IndependentLoop, cancel: CancellationToken) {
    let rect = CaptureRect::for_geometry(&ctx.rule.geometry);
    log_info!("independent loop started for rule '{}'", ctx.rule.id);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // The iteration always runs to completion: cancellation is only
        // observed between iterations, so a started dispatch always pairs
        // its key-down with a key-up before the loop exits.
        iteration(&ctx, &rect).await;

        let (min, max) = ctx.settings.tick_delay_bounds();
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::select! {
            _ = sleep(Duration::from_millis(delay)) => {}
            _ = cancel.cancelled() => break,
        }
    }

    log_info!("independent loop for '{}' shutting down", ctx.rule.id);
}

async fn iteration(ctx: &IndependentLoop, rect: &CaptureRect) {
    let raw = match ctx.frames.capture(rect) {
        Ok(frame) => matcher::raw_match(&ctx.rule, std::slice::from_ref(&frame)),
        Err(err) => {
            log_warn!("capture failed for rule '{}': {}", ctx.rule.id, err);
            false
        }
    };

    // Conditions resolve against the store only: shared-tick dependencies
    // are as fresh as the last shared tick, a staleness this loop accepts.
    let eligible = raw
        && ctx.rule.conditions.iter().all(|cond| {
            ctx.store.eligible(&cond.rule).unwrap_or(false) == cond.required
        });

    ctx.store.update(&ctx.rule.id, raw, eligible);

    if eligible && ctx.rule.fire {
        if let Err(err) = ctx.dispatcher.dispatch(&ctx.rule).await {
            log_warn!("dispatch failed for rule '{}': {}", ctx.rule.id, err);
        }
    }
}
