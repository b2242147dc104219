use serde::{Deserialize, Serialize};

use super::rule::{Modifier, Rule, RuleId};

/// A validated rule set handed to the pipeline at load time.
///
/// The pipeline treats a profile as immutable for the duration of a run;
/// structural edits go through stop → mutate → load → start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub rules: Vec<Rule>,
    /// Physical modifiers that pause the shared tick while held, letting the
    /// user's own input pass through without synthetic presses interleaving.
    #[serde(default)]
    pub pause_on_modifiers: Vec<Modifier>,
}

impl Profile {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
            pause_on_modifiers: Vec::new(),
        }
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Enabled rules evaluated on the shared tick (not independent).
    pub fn shared_rules(&self) -> impl Iterator<Item = &Rule> {
        self.enabled_rules().filter(|r| !r.independent)
    }

    pub fn independent_rules(&self) -> impl Iterator<Item = &Rule> {
        self.enabled_rules().filter(|r| r.independent)
    }

    pub fn enabled_ids(&self) -> Vec<RuleId> {
        self.enabled_rules().map(|r| r.id.clone()).collect()
    }
}
