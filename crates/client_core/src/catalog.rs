//! Known wizard steps, from an engine template or the static fallback list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{StepId, StepKey},
    protocol::WorkflowStep,
};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: StepId,
    pub key: StepKey,
    pub label: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        key: impl AsRef<str>,
        label: impl Into<String>,
        path: impl Into<String>,
        ordinal: u32,
    ) -> Self {
        Self {
            id: StepId::new(id),
            key: StepKey::new(key),
            label: label.into(),
            path: path.into(),
            ordinal: Some(ordinal),
        }
    }
}

impl From<WorkflowStep> for StepDefinition {
    fn from(step: WorkflowStep) -> Self {
        Self {
            id: step.id,
            key: step.key,
            label: step.label,
            path: step.path,
            ordinal: step.ordinal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Template,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
    source: CatalogSource,
}

impl StepCatalog {
    pub fn static_fallback() -> Self {
        Self {
            steps: vec![
                StepDefinition::new(
                    "s1",
                    "PARTICIPANTES",
                    "Participantes",
                    "/inscricao/participantes",
                    1,
                ),
                StepDefinition::new("s2", "PROPERTY", "Imóvel", "/inscricao/imovel", 2),
                StepDefinition::new(
                    "s3",
                    "ENTERPRISE",
                    "Empreendimento",
                    "/inscricao/empreendimento",
                    3,
                ),
                StepDefinition::new("s4", "FORM", "Formulário", "/inscricao/formulario", 4),
                StepDefinition::new(
                    "s5",
                    "DOCUMENTS",
                    "Documentação",
                    "/inscricao/documentacao",
                    5,
                ),
                StepDefinition::new("s6", "REVIEW", "Revisão", "/inscricao/revisao", 6),
            ],
            source: CatalogSource::Static,
        }
    }

    /// No steps yet; progress renders as loading.
    pub fn empty() -> Self {
        Self {
            steps: Vec::new(),
            source: CatalogSource::Template,
        }
    }

    /// Builds a catalog from engine template steps.
    ///
    /// Steps are ordered by their ordinal when every step carries one. A key
    /// that appears twice keeps its first definition.
    pub fn from_template(steps: Vec<WorkflowStep>) -> Self {
        let mut steps: Vec<StepDefinition> = steps.into_iter().map(StepDefinition::from).collect();
        if steps.iter().all(|step| step.ordinal.is_some()) {
            steps.sort_by_key(|step| step.ordinal);
        }

        let mut seen = HashSet::new();
        steps.retain(|step| {
            let first = seen.insert(step.key.clone());
            if !first {
                warn!(step_key = %step.key, "duplicate step key in template; keeping first");
            }
            first
        });

        Self {
            steps,
            source: CatalogSource::Template,
        }
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    pub fn get(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Manual-mode ordinal of the entry at `index` (1-based).
    pub fn ordinal_at(&self, index: usize) -> Option<u32> {
        let step = self.steps.get(index)?;
        Some(
            step.ordinal
                .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX)),
        )
    }

    pub fn find_by_path(&self, path: &str) -> Option<(usize, &StepDefinition)> {
        let wanted = normalize_path(path);
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| normalize_path(&step.path) == wanted)
    }

    pub fn find_by_key(&self, key: &StepKey) -> Option<(usize, &StepDefinition)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| &step.key == key)
    }

    pub fn index_of_key(&self, key: &StepKey) -> Option<usize> {
        self.find_by_key(key).map(|(index, _)| index)
    }

    pub fn find_by_ordinal(&self, ordinal: u32) -> Option<(usize, &StepDefinition)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(index, _)| self.ordinal_at(*index) == Some(ordinal))
    }
}

/// Route comparison form: no query, no fragment, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let without_fragment = path.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    let trimmed = without_query.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
