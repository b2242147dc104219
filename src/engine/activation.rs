use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::RuleId;

/// Latest evaluation outcome for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    /// Raw match result, before the condition chain.
    pub matched: bool,
    /// Post-condition-chain eligibility.
    pub eligible: bool,
    pub updated_at: DateTime<Utc>,
}

/// Best-effort notification emitted when a rule's eligibility flips.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationChange {
    pub rule: RuleId,
    pub eligible: bool,
    pub at: DateTime<Utc>,
}

/// Shared rule-id → activation mapping, the only state touched by more than
/// one execution context. The lock is held per read or per write only, never
/// across a capture or a dispatch.
#[derive(Clone, Default)]
pub struct ActivationStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<RuleId, ActivationRecord>,
    notify: Option<mpsc::UnboundedSender<ActivationChange>>,
}

impl ActivationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the notification channel; consumers run outside the lock
    /// and a lagging or dropped receiver never blocks the pipeline.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ActivationChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().notify = Some(tx);
        rx
    }

    pub fn update(&self, rule: &RuleId, matched: bool, eligible: bool) {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let changed = inner
            .records
            .get(rule)
            .map(|r| r.eligible != eligible)
            .unwrap_or(true);
        inner.records.insert(
            rule.clone(),
            ActivationRecord {
                matched,
                eligible,
                updated_at: now,
            },
        );
        if changed {
            if let Some(tx) = &inner.notify {
                let _ = tx.send(ActivationChange {
                    rule: rule.clone(),
                    eligible,
                    at: now,
                });
            }
        }
    }

    /// Last resolved eligibility, `None` when the rule was never refreshed.
    pub fn eligible(&self, rule: &str) -> Option<bool> {
        self.inner
            .lock()
            .unwrap()
            .records
            .get(rule)
            .map(|r| r.eligible)
    }

    /// Detached copy for visualization; identical across calls when no tick
    /// ran in between.
    pub fn snapshot(&self) -> HashMap<RuleId, ActivationRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().records.clear();
    }
}
