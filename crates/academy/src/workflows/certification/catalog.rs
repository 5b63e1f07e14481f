use std::collections::BTreeSet;

use super::domain::{ModuleDefinition, ModuleId};

/// Default minimum passing quiz score, in percent.
pub const DEFAULT_PASS_MARK: u8 = 80;

/// Read-only module catalog, ordered by index.
///
/// Content management owns the entries; the workflow only consults ordering,
/// the free/paid flag, and the per-module pass mark.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: Vec<ModuleDefinition>,
}

/// Error enumeration for malformed catalog definitions.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate module id '{0}'")]
    DuplicateId(ModuleId),
    #[error("duplicate module index {0}")]
    DuplicateIndex(u16),
    #[error("module '{id}' has pass mark {pass_mark} above 100")]
    InvalidPassMark { id: ModuleId, pass_mark: u8 },
}

impl ModuleCatalog {
    pub fn new(mut modules: Vec<ModuleDefinition>) -> Result<Self, CatalogError> {
        modules.sort_by_key(|module| module.index);

        let mut ids = BTreeSet::new();
        let mut indexes = BTreeSet::new();
        for module in &modules {
            if module.pass_mark > 100 {
                return Err(CatalogError::InvalidPassMark {
                    id: module.id.clone(),
                    pass_mark: module.pass_mark,
                });
            }
            if !ids.insert(module.id.clone()) {
                return Err(CatalogError::DuplicateId(module.id.clone()));
            }
            if !indexes.insert(module.index) {
                return Err(CatalogError::DuplicateIndex(module.index));
            }
        }

        Ok(Self { modules })
    }

    /// The production curriculum: one free preview module, then the paid chain.
    pub fn standard() -> Self {
        let definitions = vec![
            ("getting-started", 0, "Getting started as an inspector", true),
            ("inspection-basics", 1, "Inspection fundamentals", false),
            ("damage-identification", 2, "Identifying and qualifying damage", false),
            ("report-production", 3, "Producing a compliant report", false),
            ("client-relations", 4, "Working with clients in the field", false),
        ];

        let modules = definitions
            .into_iter()
            .map(|(id, index, title, free)| ModuleDefinition {
                id: ModuleId::new(id),
                index,
                title: title.to_string(),
                free,
                pass_mark: DEFAULT_PASS_MARK,
            })
            .collect();

        Self::new(modules).expect("standard catalog is well formed")
    }

    pub fn modules(&self) -> &[ModuleDefinition] {
        &self.modules
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleDefinition> {
        self.modules.iter().find(|module| &module.id == id)
    }

    /// Modules strictly before the given index, in catalog order.
    pub fn before(&self, index: u16) -> impl Iterator<Item = &ModuleDefinition> {
        self.modules.iter().filter(move |module| module.index < index)
    }

    pub fn last(&self) -> Option<&ModuleDefinition> {
        self.modules.last()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
