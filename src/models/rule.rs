use serde::{Deserialize, Serialize};

/// Stable identifier for a rule. Assigned by the editor, unique within a
/// profile, survives profile edits.
pub type RuleId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Reference color, alpha stripped. Capture backends hand us RGBA or BGRA;
/// everything past the first three channels is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel-wise distance test. Tolerance 0 means exact equality.
    pub fn within_tolerance(&self, other: Rgb, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }
}

/// What a rule samples from the screen.
///
/// Pixel mode checks a single coordinate. Area mode checks five checkpoints
/// spread over a declared region (center plus the four corners); the rule
/// matches only when every checkpoint passes, which guards against a single
/// anti-aliased or partially occluded pixel producing a false positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum SampleGeometry {
    Pixel {
        point: Point,
        color: Rgb,
    },
    Area {
        center: Point,
        width: u32,
        height: u32,
        /// Reference colors in checkpoint order: center, top-left,
        /// top-right, bottom-left, bottom-right.
        colors: [Rgb; 5],
    },
}

impl SampleGeometry {
    pub fn center(&self) -> Point {
        match self {
            SampleGeometry::Pixel { point, .. } => *point,
            SampleGeometry::Area { center, .. } => *center,
        }
    }

    /// Absolute checkpoint coordinates paired with their reference colors.
    pub fn checkpoints(&self) -> Vec<(Point, Rgb)> {
        match self {
            SampleGeometry::Pixel { point, color } => vec![(*point, *color)],
            SampleGeometry::Area {
                center,
                width,
                height,
                colors,
            } => {
                let half_w = (*width / 2) as i32;
                let half_h = (*height / 2) as i32;
                let left = center.x - half_w;
                let top = center.y - half_h;
                // Inclusive far edge of the region.
                let right = left + *width as i32 - 1;
                let bottom = top + *height as i32 - 1;
                vec![
                    (*center, colors[0]),
                    (Point::new(left, top), colors[1]),
                    (Point::new(right, top), colors[2]),
                    (Point::new(left, bottom), colors[3]),
                    (Point::new(right, bottom), colors[4]),
                ]
            }
        }
    }

    /// Bounding box of the sampled area as (top-left, width, height).
    pub fn bounds(&self) -> (Point, u32, u32) {
        match self {
            SampleGeometry::Pixel { point, .. } => (*point, 1, 1),
            SampleGeometry::Area {
                center,
                width,
                height,
                ..
            } => {
                let left = center.x - (*width / 2) as i32;
                let top = center.y - (*height / 2) as i32;
                (Point::new(left, top), *width, *height)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

/// Press-duration range in milliseconds; the actual hold time is drawn
/// uniformly per activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBinding {
    /// Logical key name, e.g. "Q" or "Space". The injector maps it to a
    /// platform key code.
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// Falls back to the engine's default press range when absent.
    #[serde(default)]
    pub press: Option<PressRange>,
}

/// One entry of a rule's condition chain: the referenced rule's activation
/// must equal `required` for this rule to be eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub rule: RuleId,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub geometry: SampleGeometry,
    #[serde(default)]
    pub tolerance: u8,
    /// When true, "match" means the sampled colors differ from the
    /// references beyond tolerance.
    #[serde(default)]
    pub inverted: bool,
    pub binding: KeyBinding,
    /// Rules sharing a non-null group are mutually exclusive per tick.
    #[serde(default)]
    pub group: Option<String>,
    /// Lower value wins arbitration within a group.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Runs on its own loop instead of the shared tick.
    #[serde(default)]
    pub independent: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When false the rule is still matched and recorded (so dependents can
    /// chain off it) but never dispatches a key press.
    #[serde(default = "default_true")]
    pub fire: bool,
}

fn default_true() -> bool {
    true
}
