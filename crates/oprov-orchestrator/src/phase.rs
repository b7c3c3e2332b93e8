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
use std::str::FromStr;

use serde::Serialize;

/// One reconciliation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Activate languages and set the partner default language.
    Langs,
    /// System parameters.
    Params,
    /// Main company metadata.
    Company,
    /// Module installation.
    Modules,
    /// Users and group membership.
    Users,
    /// Outgoing and incoming mail servers.
    Mail,
}

impl Phase {
    /// Phases in execution order.
    pub const ORDERED: [Phase; 6] = [
        Phase::Langs,
        Phase::Params,
        Phase::Company,
        Phase::Modules,
        Phase::Users,
        Phase::Mail,
    ];

    /// Name used on the command line and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Langs => "langs",
            Phase::Params => "params",
            Phase::Company => "company",
            Phase::Modules => "modules",
            Phase::Users => "users",
            Phase::Mail => "mail",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Phase::ORDERED
            .into_iter()
            .find(|phase| phase.as_str() == value)
            .ok_or_else(|| format!("unknown phase '{value}'"))
    }
}

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseSelection {
    /// Every phase in order.
    #[default]
    All,
    /// Exactly one phase.
    Only(Phase),
}

impl PhaseSelection {
    /// Phases selected, in execution order.
    pub fn phases(&self) -> Vec<Phase> {
        match self {
            PhaseSelection::All => Phase::ORDERED.to_vec(),
            PhaseSelection::Only(phase) => vec![*phase],
        }
    }
}

impl FromStr for PhaseSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(PhaseSelection::All),
            other => other.parse().map(PhaseSelection::Only),
        }
    }
}
