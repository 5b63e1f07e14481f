//! Single authority for every gate decision in the workflow.
//!
//! UI screens and handlers never re-derive lock state from raw flags; they
//! ask this module.

use std::collections::BTreeMap;

use super::catalog::ModuleCatalog;
use super::domain::{
    EnrollmentState, ModuleDefinition, ModuleId, ModuleProgress, ReviewStatus,
};
use super::repository::StudentRecord;

/// A precondition that was not met. Recoverable only by completing the
/// prerequisite it names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateViolation {
    #[error("candidate did not pass qualification and cannot register")]
    NotEligible,
    #[error("module '{module}' is locked until the quiz for '{missing}' is passed")]
    ModuleLocked { module: ModuleId, missing: ModuleId },
    #[error("paid modules require a purchase and a validated professional project")]
    AccessDenied,
    #[error("student has no purchase awaiting project validation")]
    NotAwaitingValidation,
    #[error("no practical assessment code has been assigned yet")]
    NoCodeAssigned,
}

/// How a module currently presents to one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleAvailability {
    Available,
    Locked,
    RequiresEnrollment,
}

impl ModuleAvailability {
    pub const fn label(self) -> &'static str {
        match self {
            ModuleAvailability::Available => "available",
            ModuleAvailability::Locked => "locked",
            ModuleAvailability::RequiresEnrollment => "requires_enrollment",
        }
    }
}

/// Check whether a student may interact with `module`.
///
/// Free modules are always open as a funnel preview. Paid modules require a
/// validated enrollment and every earlier module to be either free or passed.
pub fn module_access(
    catalog: &ModuleCatalog,
    module: &ModuleDefinition,
    enrollment: &EnrollmentState,
    progress: &BTreeMap<ModuleId, ModuleProgress>,
) -> Result<(), GateViolation> {
    if module.free {
        return Ok(());
    }

    if !enrollment.is_validated() {
        return Err(GateViolation::AccessDenied);
    }

    for earlier in catalog.before(module.index) {
        if earlier.free {
            continue;
        }
        let passed = progress
            .get(&earlier.id)
            .map(|entry| entry.passed(earlier))
            .unwrap_or(false);
        if !passed {
            return Err(GateViolation::ModuleLocked {
                module: module.id.clone(),
                missing: earlier.id.clone(),
            });
        }
    }

    Ok(())
}

/// Availability label for listings, mirroring [`module_access`].
pub fn module_availability(
    catalog: &ModuleCatalog,
    module: &ModuleDefinition,
    enrollment: &EnrollmentState,
    progress: &BTreeMap<ModuleId, ModuleProgress>,
) -> ModuleAvailability {
    match module_access(catalog, module, enrollment, progress) {
        Ok(()) => ModuleAvailability::Available,
        Err(GateViolation::AccessDenied) => ModuleAvailability::RequiresEnrollment,
        Err(_) => ModuleAvailability::Locked,
    }
}

/// True when every upstream gate is satisfied simultaneously.
///
/// This is the issuance condition for the certification issuer; it never
/// consults the stored certificate itself.
pub fn certificate_conditions_met(catalog: &ModuleCatalog, record: &StudentRecord) -> bool {
    if !record.student.enrollment.is_validated() {
        return false;
    }

    let all_modules_passed = catalog.modules().iter().all(|module| {
        record
            .progress
            .get(&module.id)
            .map(|entry| entry.passed(module))
            .unwrap_or(false)
    });
    if !all_modules_passed {
        return false;
    }

    if record.license.is_none() {
        return false;
    }

    let practical_approved = record
        .practical
        .as_ref()
        .map(|assessment| assessment.result == ReviewStatus::Approved)
        .unwrap_or(false);
    if !practical_approved {
        return false;
    }

    record.satisfaction_completed
}
