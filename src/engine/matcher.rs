//! Per-rule match predicate over captured frames.

use log::warn;

use crate::capture::Frame;
use crate::models::{Point, Rgb, Rule};

/// Evaluates one rule's raw match against the frames captured this tick.
///
/// Area mode requires every checkpoint to pass; inversion flips the
/// aggregate result, not each checkpoint. A checkpoint outside every frame
/// (e.g. a rule edited after the capture plan was computed) downgrades the
/// rule to non-match regardless of inversion — an unevaluated sample is
/// never a match.
pub fn raw_match(rule: &Rule, frames: &[Frame]) -> bool {
    // Sample everything first: if any checkpoint cannot be evaluated the
    // rule is a non-match, inverted or not.
    let mut samples = Vec::with_capacity(5);
    for (point, reference) in rule.geometry.checkpoints() {
        let Some(sampled) = sample(frames, point) else {
            warn!(
                "rule '{}': sample point ({}, {}) outside captured region, treating as non-match",
                rule.id, point.x, point.y
            );
            return false;
        };
        samples.push((sampled, reference));
    }

    let all_within = samples
        .iter()
        .all(|(sampled, reference)| sampled.within_tolerance(*reference, rule.tolerance));
    all_within != rule.inverted
}

fn sample(frames: &[Frame], point: Point) -> Option<Rgb> {
    frames.iter().find_map(|f| f.color_at(point))
}
