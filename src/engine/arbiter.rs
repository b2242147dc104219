//! Mutual-exclusion group arbitration.

use std::collections::HashMap;

use crate::models::Rule;

/// Among simultaneously eligible rules, picks the ones allowed to dispatch
/// this tick: groupless rules always pass, each group contributes exactly
/// its lowest-priority-value member (ties broken by rule id for
/// determinism). Input order is preserved in the output.
///
/// Suppressed rules keep their activation record; they are only withheld
/// from the dispatcher.
pub fn select_winners<'a>(eligible: &[&'a Rule]) -> Vec<&'a Rule> {
    let mut best: HashMap<&str, &Rule> = HashMap::new();
    for &rule in eligible {
        let Some(group) = rule.group.as_deref() else {
            continue;
        };
        best.entry(group)
            .and_modify(|current| {
                if (rule.priority, rule.id.as_str()) < (current.priority, current.id.as_str()) {
                    *current = rule;
                }
            })
            .or_insert(rule);
    }

    eligible
        .iter()
        .filter(|rule| match rule.group.as_deref() {
            None => true,
            Some(group) => best[group].id == rule.id,
        })
        .copied()
        .collect()
}
