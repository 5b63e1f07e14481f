use std::collections::BTreeMap;

use serde::Serialize;

use super::catalog::ModuleCatalog;
use super::domain::{
    Candidate, CandidateId, Certificate, ComplianceDocument, ModuleDefinition, ModuleId,
    ModuleProgress, PracticalAssessment, ReviewStatus, Student, StudentId,
};
use super::gates;

/// Aggregate persisted per student: identity plus the state of every gate.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub student: Student,
    pub progress: BTreeMap<ModuleId, ModuleProgress>,
    pub license: Option<ComplianceDocument>,
    pub practical: Option<PracticalAssessment>,
    pub satisfaction_completed: bool,
    pub certificate: Option<Certificate>,
}

impl StudentRecord {
    pub fn new(student: Student) -> Self {
        Self {
            student,
            progress: BTreeMap::new(),
            license: None,
            practical: None,
            satisfaction_completed: false,
            certificate: None,
        }
    }

    /// Access snapshot for the student's own profile read.
    pub fn access_status(&self) -> AccessStatusView {
        AccessStatusView {
            has_purchased: self.student.enrollment.has_purchased(),
            validation_pending: self.student.enrollment.validation_pending(),
            is_validated: self.student.enrollment.is_validated(),
            validation_notes: self.student.enrollment.notes().map(str::to_string),
            certificate_url: self
                .certificate
                .as_ref()
                .map(|certificate| certificate.document_ref.clone()),
        }
    }

    /// Admin-facing progress summary across all gates.
    pub fn progress_view(&self, catalog: &ModuleCatalog) -> StudentProgressView {
        let modules_completed = catalog
            .modules()
            .iter()
            .filter(|module| {
                self.progress
                    .get(&module.id)
                    .map(|entry| entry.completed_at.is_some())
                    .unwrap_or(false)
            })
            .count();
        let modules_passed = catalog
            .modules()
            .iter()
            .filter(|module| {
                self.progress
                    .get(&module.id)
                    .map(|entry| entry.passed(module))
                    .unwrap_or(false)
            })
            .count();

        StudentProgressView {
            student_id: self.student.id,
            email: self.student.email.clone(),
            enrollment: self.student.enrollment.review_status().label(),
            has_purchased: self.student.enrollment.has_purchased(),
            modules_completed,
            modules_passed,
            total_modules: catalog.len(),
            license_uploaded: self.license.is_some(),
            practical_code: self
                .practical
                .as_ref()
                .map(|assessment| assessment.code.clone()),
            practical_result: self
                .practical
                .as_ref()
                .map(|assessment| assessment.result)
                .unwrap_or(ReviewStatus::Pending)
                .label(),
            satisfaction_completed: self.satisfaction_completed,
            certificate_issued: self.certificate.is_some(),
        }
    }

    /// Per-module view combining the catalog entry with this student's state.
    pub fn module_view(&self, catalog: &ModuleCatalog, module: &ModuleDefinition) -> ModuleView {
        let progress = self.progress.get(&module.id).cloned().unwrap_or_default();
        let availability =
            gates::module_availability(catalog, module, &self.student.enrollment, &self.progress);

        ModuleView {
            id: module.id.clone(),
            index: module.index,
            title: module.title.clone(),
            free: module.free,
            pass_mark: module.pass_mark,
            availability: availability.label(),
            completed: progress.completed_at.is_some(),
            best_quiz_score: progress.best_quiz_score,
            passed: progress.passed(module),
        }
    }
}

/// Storage abstraction for pre-account submissions.
pub trait CandidateRepository: Send + Sync {
    fn insert(&self, candidate: Candidate) -> Result<Candidate, RepositoryError>;
    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError>;
}

/// Storage abstraction for enrolled students and their gate state.
pub trait StudentRepository: Send + Sync {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError>;

    /// Apply `apply` to the stored record in place and return its result.
    ///
    /// The read-modify-write must be atomic per student: implementations run
    /// the closure under whatever lock or transaction guards the record, so a
    /// concurrent writer can never overwrite another's gate state with a
    /// stale copy.
    fn mutate<F, T>(&self, id: &StudentId, apply: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut StudentRecord) -> T;
    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError>;
    fn find_by_candidate(&self, id: &CandidateId)
        -> Result<Option<StudentRecord>, RepositoryError>;
    fn pending_validation(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError>;
    fn all(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError>;

    /// Store-if-absent for the terminal artifact.
    ///
    /// Implementations must decide the winner atomically: the first caller's
    /// certificate is stored, and every later caller gets that same stored
    /// certificate back unchanged.
    fn issue_certificate(
        &self,
        id: &StudentId,
        certificate: Certificate,
    ) -> Result<Certificate, RepositoryError>;
}

/// Narrow interface to the external file store for uploaded documents and
/// rendered certificates.
pub trait DocumentStore: Send + Sync {
    fn store_license(
        &self,
        student: &StudentId,
        file_name: &str,
        content: &[u8],
    ) -> Result<String, DocumentStoreError>;

    fn certificate_url(&self, student: &StudentId) -> Result<String, DocumentStoreError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Document store dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized access snapshot exposed on the student's profile read.
#[derive(Debug, Clone, Serialize)]
pub struct AccessStatusView {
    pub has_purchased: bool,
    pub validation_pending: bool,
    pub is_validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
}

/// Admin listing row summarizing one student's position in the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct StudentProgressView {
    pub student_id: StudentId,
    pub email: String,
    pub enrollment: &'static str,
    pub has_purchased: bool,
    pub modules_completed: usize,
    pub modules_passed: usize,
    pub total_modules: usize,
    pub license_uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practical_code: Option<String>,
    pub practical_result: &'static str,
    pub satisfaction_completed: bool,
    pub certificate_issued: bool,
}

/// Module listing entry for the learner-facing catalog read.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleView {
    pub id: ModuleId,
    pub index: u16,
    pub title: String,
    pub free: bool,
    pub pass_mark: u8,
    pub availability: &'static str,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_quiz_score: Option<u8>,
    pub passed: bool,
}

/// Snapshot returned by progress mutations, pairing the raw progress with
/// the derived pass state.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub module_id: ModuleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_quiz_score: Option<u8>,
    pub passed: bool,
    pub pass_mark: u8,
}

impl ProgressView {
    pub fn for_module(module: &ModuleDefinition, progress: &ModuleProgress) -> Self {
        Self {
            module_id: module.id.clone(),
            completed_at: progress.completed_at,
            best_quiz_score: progress.best_quiz_score,
            passed: progress.passed(module),
            pass_mark: module.pass_mark,
        }
    }
}
