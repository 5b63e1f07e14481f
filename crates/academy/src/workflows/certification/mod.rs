//! Learner qualification and certification workflow.
//!
//! One explicit state machine per student: questionnaire intake, account
//! provisioning, the enrollment gate, ordered module progression, the
//! compliance-document gate, the practical assessment gate, and finally
//! exactly-once certificate issuance. Everything outside those gates
//! (payments, file storage, content delivery) stays behind the seams in
//! [`repository`].

pub mod catalog;
pub mod domain;
pub mod gates;
pub mod intake;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, ModuleCatalog, DEFAULT_PASS_MARK};
pub use domain::{
    Candidate, CandidateId, CandidateSubmission, Certificate, ComplianceDocument, ContactDetails,
    DeviceReadiness, DisabilityDisclosure, EligibilityVerdict, EnrollmentState, ModuleDefinition,
    ModuleId, ModuleProgress, PracticalAssessment, ReasonCode, ReviewStatus, Student, StudentId,
};
pub use gates::{GateViolation, ModuleAvailability};
pub use intake::{IntakeGuard, Questionnaire};
pub use repository::{
    AccessStatusView, CandidateRepository, DocumentStore, DocumentStoreError, ModuleView,
    ProgressView, RepositoryError, StudentProgressView, StudentRecord, StudentRepository,
};
pub use router::{certification_router, Caller, CallerResolver};
pub use service::{
    CertificationService, ConflictError, LicenseUpload, NotFoundError, RegistrationRequest,
    ValidationError, WorkflowError, MAX_LICENSE_BYTES,
};
