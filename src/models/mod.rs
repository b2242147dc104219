pub mod profile;
pub mod rule;

pub use profile::Profile;
pub use rule::{
    Condition, KeyBinding, Modifier, Point, PressRange, Rgb, Rule, RuleId, SampleGeometry,
};
