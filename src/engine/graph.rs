//! Condition-chain dependency graph.
//!
//! An edge from rule A to rule B means "A's eligibility depends on B's
//! activation". The graph is restricted to enabled rules; references to
//! disabled or unknown rules are treated as external lookups against the
//! activation store, not as edges. Keyed by stable rule ids so profile edits
//! never invalidate indices.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::models::{Profile, Rule, RuleId};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Cycle check plus one topological order (dependencies first), computed
/// once per profile load and reused every tick.
pub fn validate_and_order(profile: &Profile) -> Result<Vec<RuleId>, ValidationError> {
    let enabled: Vec<&Rule> = profile.enabled_rules().collect();
    let ids: Vec<&RuleId> = enabled.iter().map(|r| &r.id).collect();
    let index: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    // Adjacency: rule -> rules it depends on (edges point at dependencies).
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); enabled.len()];
    for (i, rule) in enabled.iter().enumerate() {
        for cond in &rule.conditions {
            if let Some(&j) = index.get(cond.rule.as_str()) {
                deps[i].push(j);
            }
        }
    }

    let mut marks = vec![Mark::Unvisited; enabled.len()];
    let mut order: Vec<RuleId> = Vec::with_capacity(enabled.len());
    let mut path: Vec<usize> = Vec::new();

    for start in 0..enabled.len() {
        if marks[start] == Mark::Unvisited {
            visit(start, &deps, &mut marks, &mut path, &mut order, &ids)?;
        }
    }

    Ok(order)
}

fn visit(
    node: usize,
    deps: &[Vec<usize>],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<RuleId>,
    ids: &[&RuleId],
) -> Result<(), ValidationError> {
    marks[node] = Mark::InProgress;
    path.push(node);

    for &dep in &deps[node] {
        match marks[dep] {
            Mark::Done => {}
            Mark::Unvisited => visit(dep, deps, marks, path, order, ids)?,
            Mark::InProgress => {
                // Re-encountering an in-progress node closes a cycle; report
                // every rule on it, from the dep back to the current node.
                let from = path.iter().position(|&n| n == dep).unwrap_or(0);
                let cycle = path[from..].iter().map(|&n| ids[n].clone()).collect();
                return Err(ValidationError::CyclicConditions { cycle });
            }
        }
    }

    path.pop();
    marks[node] = Mark::Done;
    order.push(ids[node].clone());
    Ok(())
}
