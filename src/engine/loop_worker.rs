//! The shared tick loop: collect → resolve → update → filter → execute.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::capture::{Frame, FrameSource, RegionPlan};
use crate::models::{Profile, Rule, RuleId};
use crate::settings::EngineSettings;
use crate::{log_debug, log_info, log_warn};

use super::activation::ActivationStore;
use super::dispatch::{Dispatcher, ModifierState};
use super::{arbiter, matcher};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

/// Everything the shared loop needs, assembled by the engine at start.
pub(crate) struct SharedLoop {
    pub profile: Arc<Profile>,
    /// Topological evaluation order over enabled rules, dependencies first.
    pub order: Arc<Vec<RuleId>>,
    pub plan: RegionPlan,
    pub store: ActivationStore,
    pub frames: Arc<dyn FrameSource>,
    pub dispatcher: Arc<Dispatcher>,
    pub modifiers: Arc<dyn ModifierState>,
    pub settings: EngineSettings,
}

pub(crate) async fn shared_loop(ctx: SharedLoop, cancel: CancellationToken) {
    log_info!("shared tick loop started for profile '{}'", ctx.profile.name);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        tick(&ctx).await;

        // Randomized inter-tick delay. A slow tick simply pushes the next
        // one out; ticks are "latest state", never queued work.
        let (min, max) = ctx.settings.tick_delay_bounds();
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::select! {
            _ = sleep(Duration::from_millis(delay)) => {}
            _ = cancel.cancelled() => break,
        }
    }

    log_info!("shared tick loop shutting down");
}

async fn tick(ctx: &SharedLoop) {
    // User is holding a guarded modifier: stay out of their way this tick.
    if ctx
        .profile
        .pause_on_modifiers
        .iter()
        .any(|&m| ctx.modifiers.is_held(m))
    {
        log_debug!("guarded modifier held, skipping tick");
        return;
    }

    // Nothing enabled on the shared tick: idle until a re-load changes that.
    if ctx.plan.is_empty() {
        return;
    }

    // Collect: one capture per planned rect. A failed rect is dropped; rules
    // sampling from it resolve to non-match for this tick.
    let mut frames: Vec<Frame> = Vec::with_capacity(ctx.plan.rects().len());
    for rect in ctx.plan.rects() {
        match ctx.frames.capture(rect) {
            Ok(frame) => frames.push(frame),
            Err(err) => log_warn!("capture failed for {:?}: {}", rect, err),
        }
    }

    // Resolve + update: walk rules in topological order so every condition
    // observes same-tick values for rules refreshed earlier in the walk.
    // Independent rules are skipped here; their conditions read whatever
    // their own loop last wrote to the store.
    let mut resolved: HashMap<&str, bool> = HashMap::new();
    for id in ctx.order.iter() {
        let Some(rule) = ctx.profile.rule(id) else {
            continue;
        };
        if rule.independent {
            continue;
        }
        let raw = matcher::raw_match(rule, &frames);
        let eligible = raw
            && rule.conditions.iter().all(|cond| {
                let actual = resolved
                    .get(cond.rule.as_str())
                    .copied()
                    .or_else(|| ctx.store.eligible(&cond.rule))
                    .unwrap_or(false);
                actual == cond.required
            });
        resolved.insert(rule.id.as_str(), eligible);
        ctx.store.update(&rule.id, raw, eligible);
    }

    // Filter: eligibility, fire flag, then group arbitration.
    let candidates: Vec<&Rule> = ctx
        .profile
        .shared_rules()
        .filter(|r| r.fire && resolved.get(r.id.as_str()).copied().unwrap_or(false))
        .collect();

    // Execute: winners dispatch sequentially before the next capture.
    for rule in arbiter::select_winners(&candidates) {
        match ctx.dispatcher.dispatch(rule).await {
            Ok(()) => log_debug!("dispatched '{}' (key '{}')", rule.id, rule.binding.key),
            Err(err) => log_warn!("dispatch failed for rule '{}': {}", rule.id, err),
        }
    }
}
