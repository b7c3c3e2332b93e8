//! ---
//! oprov_section: "04-configuration-orchestration"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Phase ordering and run orchestration."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::fmt;

use oprov_reconcile::Outcome;
use serde::Serialize;

use crate::phase::Phase;

/// Outcome for one named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    /// Natural key of the resource (`lang:es_ES`, `alice`, ...).
    pub resource: String,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Everything one phase did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// Phase that produced the report.
    pub phase: Phase,
    /// Per-resource outcomes in processing order.
    pub resources: Vec<ResourceReport>,
}

impl PhaseReport {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            resources: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, resource: impl Into<String>, outcome: Outcome) {
        self.resources.push(ResourceReport {
            resource: resource.into(),
            outcome,
        });
    }

    /// Outcome recorded for `resource`.
    pub fn outcome(&self, resource: &str) -> Option<&Outcome> {
        self.resources
            .iter()
            .find(|entry| entry.resource == resource)
            .map(|entry| &entry.outcome)
    }

    /// Number of resources whose outcome carries `label`.
    pub fn count(&self, label: &str) -> usize {
        self.resources
            .iter()
            .filter(|entry| entry.outcome.label() == label)
            .count()
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Reports of the phases executed, in order.
    pub phases: Vec<PhaseReport>,
}

impl ProvisionReport {
    /// Report of `phase`, when it ran.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|report| report.phase == phase)
    }

    /// Total resources carrying `label` across phases.
    pub fn count(&self, label: &str) -> usize {
        self.phases.iter().map(|report| report.count(label)).sum()
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} phase(s): created={} updated={} unchanged={} skipped={}",
            self.phases.len(),
            self.count("created"),
            self.count("updated"),
            self.count("unchanged"),
            self.count("skipped")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_serializes_with_flattened_outcomes() {
        let mut users = PhaseReport::new(Phase::Users);
        users.push("alice", Outcome::Created(7));
        users.push("bob", Outcome::Skipped("no groups resolved".into()));
        let report = ProvisionReport {
            phases: vec![users],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "phases": [{
                    "phase": "users",
                    "resources": [
                        {"resource": "alice", "outcome": "created", "detail": 7},
                        {"resource": "bob", "outcome": "skipped", "detail": "no groups resolved"}
                    ]
                }]
            })
        );
        assert_eq!(
            report.to_string(),
            "1 phase(s): created=1 updated=0 unchanged=0 skipped=1"
        );
    }
}
