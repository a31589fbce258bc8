//! Core types for execution planning

use crate::lifecycle::PropagationCheck;
use catalog::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action requested for a managed entity by the state-diffing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Destroy,
    /// Destroy and recreate; split into `create_new` and `destroy_old` steps
    Replace,
}

impl Action {
    /// Check if the action removes an existing instance
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Destroy | Self::Replace)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
            Action::Replace => "replace",
        };
        write!(f, "{s}")
    }
}

/// Operation carried out by a single plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read a data source
    Read,
    Create,
    Update,
    /// First half of a replacement: bring up the new instance
    CreateNew,
    /// Second half of a replacement: remove the old instance
    DestroyOld,
    Destroy,
}

impl Operation {
    /// Steps that bring an entity to its target state
    pub fn is_up(&self) -> bool {
        matches!(
            self,
            Self::Read | Self::Create | Self::Update | Self::CreateNew
        )
    }

    /// Steps that remove an instance
    pub fn is_down(&self) -> bool {
        matches!(self, Self::DestroyOld | Self::Destroy)
    }

    /// Short marker used when rendering a plan
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Read => "<=",
            Operation::Create => "+",
            Operation::Update => "~",
            Operation::CreateNew => "+/-",
            Operation::DestroyOld => "-/+",
            Operation::Destroy => "-",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::CreateNew => "create_new",
            Operation::DestroyOld => "destroy_old",
            Operation::Destroy => "destroy",
        };
        write!(f, "{s}")
    }
}

/// One (entity, operation) pair in a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: EntityId,
    pub operation: Operation,
}

impl PlanStep {
    pub fn new(id: EntityId, operation: Operation) -> Self {
        Self { id, operation }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<3} {} ({})", self.operation.symbol(), self.id, self.operation)
    }
}

/// Steps with no ordering between them; safe to run concurrently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub steps: Vec<PlanStep>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if the batch holds `operation` for `id`
    pub fn contains(&self, id: &EntityId, operation: Operation) -> bool {
        self.steps
            .iter()
            .any(|s| &s.id == id && s.operation == operation)
    }
}

/// An ordered sequence of batches.
///
/// Every dependency of a batch is satisfied by strictly earlier batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub batches: Vec<Batch>,
}

impl ExecutionPlan {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// All steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.batches.iter().flat_map(|b| b.steps.iter())
    }

    /// Total number of steps across all batches
    pub fn total_steps(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Index of the batch holding `operation` for `id`
    pub fn position(&self, id: &EntityId, operation: Operation) -> Option<usize> {
        self.batches.iter().position(|b| b.contains(id, operation))
    }

    /// Index of the first batch that touches `id`
    pub fn first_position(&self, id: &EntityId) -> Option<usize> {
        self.batches
            .iter()
            .position(|b| b.steps.iter().any(|s| &s.id == id))
    }

    /// Count steps by kind
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for step in self.steps() {
            summary.add_step(step);
        }
        summary
    }

    /// Serialize the plan as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// blake3 digest (hex) of the plan's JSON form.
    ///
    /// Identical plans, including the order within each batch, share a
    /// fingerprint.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, batch) in self.batches.iter().enumerate() {
            writeln!(f, "Batch {}:", i + 1)?;
            for step in &batch.steps {
                writeln!(f, "  {step}")?;
            }
        }
        write!(f, "{}", self.summary())
    }
}

/// Step counts for a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub read: usize,
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub destroy: usize,
}

impl PlanSummary {
    /// Add a step to the summary; a replacement counts once, on `create_new`
    pub fn add_step(&mut self, step: &PlanStep) {
        match step.operation {
            Operation::Read => self.read += 1,
            Operation::Create => self.create += 1,
            Operation::Update => self.update += 1,
            Operation::CreateNew => self.replace += 1,
            Operation::DestroyOld => {}
            Operation::Destroy => self.destroy += 1,
        }
    }

    /// Total number of changes to managed entities
    pub fn total_changes(&self) -> usize {
        self.create + self.update + self.replace + self.destroy
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to replace, {} to destroy, {} to read",
            self.create, self.update, self.replace, self.destroy, self.read
        )
    }
}

/// Options for planning
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// How lifecycle propagation is checked
    pub propagation: PropagationCheck,
}
