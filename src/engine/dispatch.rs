//! Key-press dispatch: down → hold → up sequences for winning rules.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::error::DispatchError;
use crate::models::{Modifier, Rule};
use crate::settings::EngineSettings;

/// Hold durations are clamped to this floor so a misconfigured range can
/// never produce a press too short for the target to register.
const PRESS_FLOOR_MS: u64 = 50;

/// Pause after each press, preventing back-to-back spam from one context.
const POST_PRESS_PAUSE_MS: (u64, u64) = (25, 50);

/// Injects synthetic key events into the OS. Implementations wrap the
/// platform input API and are supplied by the embedding application.
pub trait KeyInjector: Send + Sync {
    fn key_down(&self, key: &str) -> Result<(), DispatchError>;
    fn key_up(&self, key: &str) -> Result<(), DispatchError>;
    fn modifier_down(&self, modifier: Modifier) -> Result<(), DispatchError>;
    fn modifier_up(&self, modifier: Modifier) -> Result<(), DispatchError>;
}

/// Reports which physical modifier keys the user is currently holding. Used
/// by the shared loop to pause synthetic output while the user types.
pub trait ModifierState: Send + Sync {
    fn is_held(&self, modifier: Modifier) -> bool;
}

/// Default state for embedders without a modifier hook: nothing is ever
/// held, the loop never pauses.
pub struct NoModifierState;

impl ModifierState for NoModifierState {
    fn is_held(&self, _modifier: Modifier) -> bool {
        false
    }
}

/// Executes key sequences for winning rules. Shared-tick rules dispatch
/// sequentially on the tick loop; independent rules call in from their own
/// tasks, so the held-key guard below is the only cross-context state.
pub struct Dispatcher {
    injector: Arc<dyn KeyInjector>,
    default_press: (u64, u64),
    /// Logical keys currently held by some dispatch in flight. A second
    /// dispatch of the same key is skipped rather than interleaved.
    held: Mutex<HashSet<String>>,
}

impl Dispatcher {
    pub fn new(injector: Arc<dyn KeyInjector>, settings: &EngineSettings) -> Self {
        Self {
            injector,
            default_press: settings.press_bounds(),
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Runs the full down/hold/up sequence for one rule. Failures are
    /// returned for logging but a key that went down always comes back up,
    /// and modifiers pressed before an error are released again.
    pub async fn dispatch(&self, rule: &Rule) -> Result<(), DispatchError> {
        let key = rule.binding.key.as_str();
        {
            let mut held = self.held.lock().unwrap();
            if !held.insert(key.to_string()) {
                debug!("key '{}' already held, skipping dispatch for '{}'", key, rule.id);
                return Ok(());
            }
        }

        let hold = self.draw_hold(rule);
        let outcome = self.press_sequence(rule, hold).await;

        self.held.lock().unwrap().remove(key);

        let pause = rand::thread_rng().gen_range(POST_PRESS_PAUSE_MS.0..=POST_PRESS_PAUSE_MS.1);
        sleep(Duration::from_millis(pause)).await;

        outcome
    }

    async fn press_sequence(&self, rule: &Rule, hold: Duration) -> Result<(), DispatchError> {
        let key = rule.binding.key.as_str();
        let mut pressed_mods: Vec<Modifier> = Vec::new();
        let mut outcome = Ok(());

        for &modifier in &rule.binding.modifiers {
            match self.injector.modifier_down(modifier) {
                Ok(()) => pressed_mods.push(modifier),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if outcome.is_ok() {
            match self.injector.key_down(key) {
                Ok(()) => {
                    sleep(hold).await;
                    if let Err(err) = self.injector.key_up(key) {
                        outcome = Err(err);
                    }
                }
                Err(err) => outcome = Err(err),
            }
        }

        for &modifier in pressed_mods.iter().rev() {
            if let Err(err) = self.injector.modifier_up(modifier) {
                warn!("failed to release modifier {:?}: {}", modifier, err);
            }
        }

        outcome
    }

    fn draw_hold(&self, rule: &Rule) -> Duration {
        let (min, max) = match rule.binding.press {
            Some(range) => {
                if range.min_ms <= range.max_ms {
                    (range.min_ms, range.max_ms)
                } else {
                    (range.max_ms, range.min_ms)
                }
            }
            None => self.default_press,
        };
        let drawn = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(drawn.max(PRESS_FLOOR_MS))
    }
}
