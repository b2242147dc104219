//! Pixel-triggered keystroke pipeline.
//!
//! Samples small screen regions on a randomized tick, evaluates per-rule
//! match predicates and condition chains, arbitrates mutual-exclusion
//! groups, and dispatches synthetic key presses. Screen capture and key
//! injection are traits ([`FrameSource`], [`KeyInjector`]) implemented by
//! the embedding application; this crate owns everything in between.

mod capture;
mod engine;
mod error;
mod models;
mod settings;
mod utils;

pub use capture::{CaptureRect, Frame, FrameSource, RegionPlan};
pub use engine::{
    ActivationChange, ActivationRecord, ActivationStore, Dispatcher, Engine, EngineState,
    KeyInjector, ModifierState, NoModifierState,
};
pub use error::{CaptureError, DispatchError, ValidationError};
pub use models::{
    Condition, KeyBinding, Modifier, Point, PressRange, Profile, Rgb, Rule, RuleId,
    SampleGeometry,
};
pub use settings::EngineSettings;
