//! Ordered migration step registry

use crate::migrations::step::MigrationStep;
use crate::migrations::steps;

/// The ordered, append-only sequence of migration steps
///
/// Index `i` represents the transition from schema version `i` to `i + 1`.
/// A registry is an explicit value owned by whoever builds the store;
/// there is no process-global step list, so tests can construct local
/// registries of arbitrary length and content.
#[derive(Default)]
pub struct MigrationRegistry {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// The released step sequence for the wirelink store schema.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.push(steps::CreateBaseSchema);
        registry.push(steps::AddAccountSigKey);
        registry.push(steps::CreateMessageSecrets);
        registry.push(steps::CreatePrivacyTokens);
        registry
    }

    /// Append a step at the end of the sequence.
    ///
    /// Released steps are never reordered, skipped, or removed; new steps
    /// are only ever appended.
    pub fn push(&mut self, step: impl MigrationStep + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Read-only access to the full sequence, for callers that apply
    /// steps manually instead of going through the upgrade runner.
    pub fn steps(&self) -> &[Box<dyn MigrationStep>] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&dyn MigrationStep> {
        self.steps.get(index).map(|s| s.as_ref())
    }
}
