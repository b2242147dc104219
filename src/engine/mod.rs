pub mod activation;
pub mod arbiter;
pub mod dispatch;
pub mod graph;
mod independent;
mod loop_worker;
pub mod matcher;

pub use activation::{ActivationChange, ActivationRecord, ActivationStore};
pub use dispatch::{Dispatcher, KeyInjector, ModifierState, NoModifierState};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{FrameSource, RegionPlan};
use crate::error::ValidationError;
use crate::models::{Profile, RuleId, SampleGeometry};
use crate::settings::EngineSettings;

use independent::{independent_loop, IndependentLoop};
use loop_worker::{shared_loop, SharedLoop};

/// Pipeline lifecycle. `StopRequested` is only observable while `stop()` is
/// in flight; every other time the engine is either stopped or running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    StopRequested,
}

/// A profile that passed validation, with the per-load derived structures:
/// topological evaluation order and the capture plan.
struct LoadedProfile {
    profile: Arc<Profile>,
    order: Arc<Vec<RuleId>>,
    plan: RegionPlan,
}

/// Owns the tick loop and the per-rule independent tasks.
///
/// Lifecycle contract: `load` (validates, only while stopped) → `start`
/// (spawns tasks) → `stop` (cancels, joins every task, clears the store).
/// The engine never mutates rule content; the activation store is the only
/// state it writes.
pub struct Engine {
    settings: EngineSettings,
    frames: Arc<dyn FrameSource>,
    injector: Arc<dyn KeyInjector>,
    modifiers: Arc<dyn ModifierState>,
    store: ActivationStore,
    loaded: Option<LoadedProfile>,
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
    state: EngineState,
}

impl Engine {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        injector: Arc<dyn KeyInjector>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            settings,
            frames,
            injector,
            modifiers: Arc::new(NoModifierState),
            store: ActivationStore::new(),
            loaded: None,
            cancel: None,
            handles: Vec::new(),
            state: EngineState::Stopped,
        }
    }

    /// Installs a modifier-state hook so the shared loop can pause while the
    /// user holds one of the profile's guarded modifiers.
    pub fn with_modifier_state(mut self, modifiers: Arc<dyn ModifierState>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Best-effort activation-change feed for UI/sound consumers. Replaces
    /// any previously returned receiver.
    pub fn activation_events(&self) -> mpsc::UnboundedReceiver<ActivationChange> {
        self.store.subscribe()
    }

    /// Validates and stages a profile: unique ids, sane geometry and press
    /// ranges, acyclic condition chains. Derives the topological evaluation
    /// order and the capture plan, both reused for the whole run.
    pub fn load(&mut self, profile: Profile) -> Result<(), ValidationError> {
        if self.state != EngineState::Stopped {
            return Err(ValidationError::PipelineRunning);
        }

        validate_rules(&profile)?;
        let order = graph::validate_and_order(&profile)?;
        let plan = RegionPlan::compute(profile.shared_rules(), self.settings.cluster_epsilon);

        info!(
            "loaded profile '{}': {} rule(s), {} capture rect(s)",
            profile.name,
            profile.rules.len(),
            plan.rects().len()
        );
        self.loaded = Some(LoadedProfile {
            profile: Arc::new(profile),
            order: Arc::new(order),
            plan,
        });
        Ok(())
    }

    /// `Stopped → Running`: spawns the shared tick loop plus one task per
    /// independent rule, all watching one cancellation token.
    pub fn start(&mut self) -> Result<()> {
        if self.state != EngineState::Stopped {
            bail!("pipeline already running");
        }
        let loaded = self.loaded.as_ref().context("no profile loaded")?;

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher::new(self.injector.clone(), &self.settings));

        self.handles.push(tokio::spawn(shared_loop(
            SharedLoop {
                profile: loaded.profile.clone(),
                order: loaded.order.clone(),
                plan: loaded.plan.clone(),
                store: self.store.clone(),
                frames: self.frames.clone(),
                dispatcher: dispatcher.clone(),
                modifiers: self.modifiers.clone(),
                settings: self.settings.clone(),
            },
            cancel.clone(),
        )));

        for rule in loaded.profile.independent_rules() {
            self.handles.push(tokio::spawn(independent_loop(
                IndependentLoop {
                    rule: Arc::new(rule.clone()),
                    store: self.store.clone(),
                    frames: self.frames.clone(),
                    dispatcher: dispatcher.clone(),
                    settings: self.settings.clone(),
                },
                cancel.clone(),
            )));
        }

        self.cancel = Some(cancel);
        self.state = EngineState::Running;
        info!("pipeline started ({} task(s))", self.handles.len());
        Ok(())
    }

    /// `Running → StopRequested → Stopped`. Returns only after every task
    /// has observed the cancellation and exited its current iteration, so no
    /// key-down is ever left without its key-up. Stop while stopped is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != EngineState::Running {
            return Ok(());
        }
        self.state = EngineState::StopRequested;

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("pipeline task failed to join: {err}");
            }
        }

        self.store.clear();
        self.state = EngineState::Stopped;
        info!("pipeline stopped");
        Ok(())
    }

    /// Read-only copy of the activation store for visualization.
    pub fn snapshot(&self) -> HashMap<RuleId, ActivationRecord> {
        self.store.snapshot()
    }
}

fn validate_rules(profile: &Profile) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for rule in &profile.rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(ValidationError::DuplicateRuleId(rule.id.clone()));
        }
        if let SampleGeometry::Area { width, height, .. } = rule.geometry {
            if width == 0 || height == 0 {
                return Err(ValidationError::InvalidGeometry {
                    rule: rule.id.clone(),
                    reason: format!("area must be at least 1x1, got {}x{}", width, height),
                });
            }
        }
        if let Some(press) = rule.binding.press {
            if press.min_ms > press.max_ms {
                return Err(ValidationError::InvalidPressRange {
                    rule: rule.id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::models::{Condition, KeyBinding, Modifier, Point, PressRange, Rgb, Rule};

    struct NullFrames;
    impl FrameSource for NullFrames {
        fn capture(
            &self,
            _rect: &crate::capture::CaptureRect,
        ) -> std::result::Result<crate::capture::Frame, crate::error::CaptureError> {
            Err(crate::error::CaptureError::Backend("no backend".into()))
        }
    }

    struct NullInjector;
    impl KeyInjector for NullInjector {
        fn key_down(&self, _key: &str) -> std::result::Result<(), DispatchError> {
            Ok(())
        }
        fn key_up(&self, _key: &str) -> std::result::Result<(), DispatchError> {
            Ok(())
        }
        fn modifier_down(&self, _m: Modifier) -> std::result::Result<(), DispatchError> {
            Ok(())
        }
        fn modifier_up(&self, _m: Modifier) -> std::result::Result<(), DispatchError> {
            Ok(())
        }
    }

    fn engine() -> Engine {
        Engine::new(
            Arc::new(NullFrames),
            Arc::new(NullInjector),
            EngineSettings::default(),
        )
    }

    fn rule(id: &str, conds: &[(&str, bool)]) -> Rule {
        Rule {
            id: id.to_string(),
            geometry: SampleGeometry::Pixel {
                point: Point::new(0, 0),
                color: Rgb::new(0, 0, 0),
            },
            tolerance: 0,
            inverted: false,
            binding: KeyBinding {
                key: "Q".into(),
                modifiers: vec![],
                press: None,
            },
            group: None,
            priority: 0,
            conditions: conds
                .iter()
                .map(|(r, required)| Condition {
                    rule: r.to_string(),
                    required: *required,
                })
                .collect(),
            independent: false,
            enabled: true,
            fire: true,
        }
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let mut engine = engine();
        let profile = Profile::new("p", vec![rule("a", &[]), rule("a", &[])]);
        assert_eq!(
            engine.load(profile),
            Err(ValidationError::DuplicateRuleId("a".into()))
        );
    }

    #[test]
    fn load_rejects_cycles_and_reports_members() {
        let mut engine = engine();
        let profile = Profile::new("p", vec![rule("x", &[("y", true)]), rule("y", &[("x", true)])]);
        match engine.load(profile) {
            Err(ValidationError::CyclicConditions { mut cycle }) => {
                cycle.sort();
                assert_eq!(cycle, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("expected cycle rejection, got {:?}", other),
        }
    }

    #[test]
    fn load_rejects_degenerate_area() {
        let mut engine = engine();
        let mut bad = rule("a", &[]);
        bad.geometry = SampleGeometry::Area {
            center: Point::new(0, 0),
            width: 0,
            height: 5,
            colors: [Rgb::new(0, 0, 0); 5],
        };
        assert!(matches!(
            engine.load(Profile::new("p", vec![bad])),
            Err(ValidationError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn load_rejects_inverted_press_range() {
        let mut engine = engine();
        let mut bad = rule("a", &[]);
        bad.binding.press = Some(PressRange {
            min_ms: 100,
            max_ms: 50,
        });
        assert_eq!(
            engine.load(Profile::new("p", vec![bad])),
            Err(ValidationError::InvalidPressRange { rule: "a".into() })
        );
    }

    #[test]
    fn start_without_profile_fails() {
        let mut engine = engine();
        assert!(engine.start().is_err());
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn stop_while_stopped_is_a_noop() {
        let mut engine = engine();
        engine.stop().await.unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn load_while_running_is_rejected() {
        let mut engine = engine();
        engine.load(Profile::new("p", vec![rule("a", &[])])).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);

        let again = Profile::new("p2", vec![rule("b", &[])]);
        assert_eq!(engine.load(again), Err(ValidationError::PipelineRunning));

        engine.stop().await.unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn stop_clears_the_activation_store() {
        let mut engine = engine();
        engine.load(Profile::new("p", vec![rule("a", &[])])).unwrap();
        engine.start().unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        engine.stop().await.unwrap();
        assert!(engine.snapshot().is_empty());
    }
}
