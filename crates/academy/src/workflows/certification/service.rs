use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::catalog::ModuleCatalog;
use super::domain::{
    Candidate, CandidateId, CandidateSubmission, Certificate, ComplianceDocument, EnrollmentState,
    ModuleId, PracticalAssessment, ReviewStatus, Student, StudentId,
};
use super::gates::{self, GateViolation};
use super::intake::IntakeGuard;
use super::repository::{
    AccessStatusView, CandidateRepository, DocumentStore, DocumentStoreError, ModuleView,
    ProgressView, RepositoryError, StudentProgressView, StudentRecord, StudentRepository,
};

/// Upper bound for uploaded compliance documents.
pub const MAX_LICENSE_BYTES: u64 = 5 * 1024 * 1024;
/// Content types accepted for the driving-license upload.
const LICENSE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "application/pdf"];
const MIN_PASSWORD_CHARS: usize = 8;

/// Credentials supplied at account provisioning. The email must re-match the
/// qualifying candidate server-side; the client-locked form field is not
/// trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
}

/// Multipart payload of the compliance-document upload.
#[derive(Debug, Clone)]
pub struct LicenseUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Malformed or missing input; recoverable by resubmitting corrected data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("email does not match the qualifying submission")]
    EmailMismatch,
    #[error("password must be at least {minimum} characters")]
    WeakPassword { minimum: usize },
    #[error("quiz score {score} is outside the 0-100 range")]
    ScoreOutOfRange { score: u16 },
    #[error("unsupported license document type '{content_type}'")]
    UnsupportedDocumentType { content_type: String },
    #[error("license document of {size} bytes exceeds the {max} byte limit")]
    DocumentTooLarge { size: u64, max: u64 },
    #[error("practical assessment code must not be empty")]
    MissingCode,
}

/// Attempted duplicate of a single-shot action; the existing record stands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("candidate already has a registered account")]
    AlreadyRegistered,
    #[error("a practical assessment code is already assigned")]
    CodeAlreadyAssigned,
}

/// Lookup against an unknown identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("candidate {0} not found")]
    Candidate(CandidateId),
    #[error("student {0} not found")]
    Student(StudentId),
    #[error("module '{0}' not found")]
    Module(ModuleId),
}

/// Error raised by the certification workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gate(#[from] GateViolation),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] DocumentStoreError),
    #[error("credential hashing failed")]
    Credential,
}

/// Service composing intake, the module catalog, the gate authority, and the
/// persistence seams into the full qualification-to-certification workflow.
pub struct CertificationService<C, S, D> {
    candidates: Arc<C>,
    students: Arc<S>,
    documents: Arc<D>,
    catalog: Arc<ModuleCatalog>,
    intake: IntakeGuard,
}

impl<C, S, D> CertificationService<C, S, D>
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    pub fn new(
        candidates: Arc<C>,
        students: Arc<S>,
        documents: Arc<D>,
        catalog: ModuleCatalog,
    ) -> Self {
        Self {
            candidates,
            students,
            documents,
            catalog: Arc::new(catalog),
            intake: IntakeGuard::default(),
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn intake(&self) -> &IntakeGuard {
        &self.intake
    }

    /// Qualification intake: screen, persist, and return the candidate.
    ///
    /// Rejected submissions are persisted too; the verdict travels with the
    /// candidate rather than surfacing as an error.
    pub fn submit_questionnaire(
        &self,
        submission: CandidateSubmission,
    ) -> Result<Candidate, WorkflowError> {
        let candidate = self.intake.candidate_from_submission(submission);
        let stored = self.candidates.insert(candidate)?;

        if stored.verdict.passed {
            info!(candidate = %stored.id, "candidate qualified");
        } else {
            info!(
                candidate = %stored.id,
                reasons = stored.verdict.failed_reasons.len(),
                "candidate screened out"
            );
        }

        Ok(stored)
    }

    /// Account provisioning: exactly one student per qualified candidate.
    pub fn register(
        &self,
        candidate_id: CandidateId,
        request: RegistrationRequest,
    ) -> Result<Student, WorkflowError> {
        let candidate = self
            .candidates
            .fetch(&candidate_id)?
            .ok_or(NotFoundError::Candidate(candidate_id))?;

        if !candidate.verdict.passed {
            return Err(GateViolation::NotEligible.into());
        }

        let supplied = request.email.trim();
        if !supplied.eq_ignore_ascii_case(candidate.contact.email.trim()) {
            return Err(ValidationError::EmailMismatch.into());
        }

        if request.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ValidationError::WeakPassword {
                minimum: MIN_PASSWORD_CHARS,
            }
            .into());
        }

        if self.students.find_by_candidate(&candidate_id)?.is_some() {
            return Err(ConflictError::AlreadyRegistered.into());
        }

        let password_hash = hash_password(&request.password)?;
        let student = Student::new(&candidate, password_hash);
        let record = self.students.insert(StudentRecord::new(student))?;

        info!(student = %record.student.id, candidate = %candidate_id, "student provisioned");
        Ok(record.student)
    }

    /// External payment confirmation. Idempotent: repeated signals for an
    /// already-purchased student change nothing.
    pub fn confirm_purchase(&self, student_id: StudentId) -> Result<AccessStatusView, WorkflowError> {
        let (confirmed, view) = self.mutate_record(student_id, |record| {
            let confirmed = matches!(record.student.enrollment, EnrollmentState::Unpaid);
            if confirmed {
                record.student.enrollment = EnrollmentState::PendingReview;
                record.student.touch();
            }
            (confirmed, record.access_status())
        })?;

        if confirmed {
            info!(student = %student_id, "purchase confirmed, awaiting project validation");
        }
        Ok(view)
    }

    pub fn access_status(&self, student_id: StudentId) -> Result<AccessStatusView, WorkflowError> {
        Ok(self.fetch_record(student_id)?.access_status())
    }

    /// Admin review of the stated professional project.
    ///
    /// Valid while pending or previously rejected; approval is terminal and
    /// re-validating an approved student is an idempotent no-op.
    pub fn validate_project(
        &self,
        student_id: StudentId,
        approve: bool,
        notes: Option<String>,
    ) -> Result<AccessStatusView, WorkflowError> {
        let (recorded, view) = self.mutate_record(student_id, |record| {
            match record.student.enrollment {
                EnrollmentState::Unpaid => Err(GateViolation::NotAwaitingValidation),
                EnrollmentState::Approved { .. } => Ok((false, record.access_status())),
                EnrollmentState::PendingReview | EnrollmentState::Rejected { .. } => {
                    record.student.enrollment = if approve {
                        EnrollmentState::Approved { notes }
                    } else {
                        EnrollmentState::Rejected { notes }
                    };
                    record.student.touch();
                    Ok((true, record.access_status()))
                }
            }
        })??;

        if recorded {
            info!(student = %student_id, approved = approve, "project validation recorded");
        }
        Ok(view)
    }

    /// Mark a module as read. Independent of quiz passing, but still subject
    /// to the ordering and enrollment gates.
    pub fn mark_complete(
        &self,
        student_id: StudentId,
        module_id: &ModuleId,
    ) -> Result<ProgressView, WorkflowError> {
        let module = self
            .catalog
            .get(module_id)
            .ok_or_else(|| NotFoundError::Module(module_id.clone()))?;

        let view = self.mutate_record(student_id, |record| {
            gates::module_access(
                &self.catalog,
                module,
                &record.student.enrollment,
                &record.progress,
            )?;

            let entry = record.progress.entry(module.id.clone()).or_default();
            entry.mark_completed(Utc::now());
            Ok::<_, GateViolation>(ProgressView::for_module(module, entry))
        })??;

        self.evaluate(student_id)?;
        Ok(view)
    }

    /// Record a quiz attempt; the best score is monotone non-decreasing.
    pub fn record_quiz_attempt(
        &self,
        student_id: StudentId,
        module_id: &ModuleId,
        score: u16,
    ) -> Result<ProgressView, WorkflowError> {
        if score > 100 {
            return Err(ValidationError::ScoreOutOfRange { score }.into());
        }

        let module = self
            .catalog
            .get(module_id)
            .ok_or_else(|| NotFoundError::Module(module_id.clone()))?;

        let view = self.mutate_record(student_id, |record| {
            gates::module_access(
                &self.catalog,
                module,
                &record.student.enrollment,
                &record.progress,
            )?;

            let entry = record.progress.entry(module.id.clone()).or_default();
            entry.record_score(score as u8);
            Ok::<_, GateViolation>(ProgressView::for_module(module, entry))
        })??;

        self.evaluate(student_id)?;
        Ok(view)
    }

    /// Learner-facing catalog listing with per-module availability.
    pub fn list_modules(&self, student_id: StudentId) -> Result<Vec<ModuleView>, WorkflowError> {
        let record = self.fetch_record(student_id)?;
        Ok(self
            .catalog
            .modules()
            .iter()
            .map(|module| record.module_view(&self.catalog, module))
            .collect())
    }

    /// Single-module read, gated the same way as interaction.
    pub fn module_view(
        &self,
        student_id: StudentId,
        module_id: &ModuleId,
    ) -> Result<ModuleView, WorkflowError> {
        let record = self.fetch_record(student_id)?;
        let module = self
            .catalog
            .get(module_id)
            .ok_or_else(|| NotFoundError::Module(module_id.clone()))?;

        gates::module_access(
            &self.catalog,
            module,
            &record.student.enrollment,
            &record.progress,
        )?;

        Ok(record.module_view(&self.catalog, module))
    }

    /// Compliance document gate: validate, store, and replace the reference.
    pub fn upload_license(
        &self,
        student_id: StudentId,
        upload: LicenseUpload,
    ) -> Result<ComplianceDocument, WorkflowError> {
        let mime: mime::Mime = upload
            .content_type
            .parse()
            .map_err(|_| ValidationError::UnsupportedDocumentType {
                content_type: upload.content_type.clone(),
            })?;
        if !LICENSE_CONTENT_TYPES.contains(&mime.essence_str()) {
            return Err(ValidationError::UnsupportedDocumentType {
                content_type: upload.content_type.clone(),
            }
            .into());
        }

        let size = upload.data.len() as u64;
        if size > MAX_LICENSE_BYTES {
            return Err(ValidationError::DocumentTooLarge {
                size,
                max: MAX_LICENSE_BYTES,
            }
            .into());
        }

        // Confirm the student exists before touching the external store.
        self.fetch_record(student_id)?;
        let storage_key =
            self.documents
                .store_license(&student_id, &upload.file_name, &upload.data)?;

        let document = ComplianceDocument {
            file_name: upload.file_name,
            content_type: mime.essence_str().to_string(),
            size_bytes: size,
            storage_key,
            uploaded_at: Utc::now(),
        };
        let stored = document.clone();
        self.mutate_record(student_id, move |record| {
            record.license = Some(stored);
        })?;
        info!(student = %student_id, "compliance document on file");

        self.evaluate(student_id)?;
        Ok(document)
    }

    /// Admin-only, single-shot assignment of the external practical test code.
    pub fn assign_code(
        &self,
        student_id: StudentId,
        code: String,
    ) -> Result<PracticalAssessment, WorkflowError> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(ValidationError::MissingCode.into());
        }

        let assessment = self.mutate_record(student_id, |record| {
            if record.practical.is_some() {
                return Err(ConflictError::CodeAlreadyAssigned);
            }

            let assessment = PracticalAssessment::assigned(code);
            record.practical = Some(assessment.clone());
            record.student.touch();
            Ok(assessment)
        })??;
        info!(student = %student_id, "practical assessment code assigned");

        Ok(assessment)
    }

    /// Admin validation of the external practical result. Re-validatable in
    /// both directions; an already-issued certificate is unaffected by later
    /// flips.
    pub fn validate_result(
        &self,
        student_id: StudentId,
        approve: bool,
        notes: Option<String>,
    ) -> Result<PracticalAssessment, WorkflowError> {
        let updated = self.mutate_record(student_id, |record| {
            let assessment = record
                .practical
                .as_mut()
                .ok_or(GateViolation::NoCodeAssigned)?;

            assessment.result = if approve {
                ReviewStatus::Approved
            } else {
                ReviewStatus::Rejected
            };
            assessment.notes = notes;
            record.student.touch();
            Ok::<_, GateViolation>(assessment.clone())
        })??;
        info!(student = %student_id, approved = approve, "practical result validated");

        self.evaluate(student_id)?;
        Ok(updated)
    }

    /// Record the satisfaction gate and return the (possibly cascaded)
    /// certification outcome.
    pub fn record_satisfaction(
        &self,
        student_id: StudentId,
        completed: bool,
    ) -> Result<Option<Certificate>, WorkflowError> {
        self.mutate_record(student_id, |record| {
            record.satisfaction_completed = completed;
        })?;

        self.evaluate(student_id)
    }

    /// Certification issuer: a query that may issue.
    ///
    /// Unmet conditions yield `None`, never an error. Issuance is a
    /// store-if-absent in the repository, so concurrent callers all observe
    /// the single winning certificate.
    pub fn evaluate(&self, student_id: StudentId) -> Result<Option<Certificate>, WorkflowError> {
        let record = self.fetch_record(student_id)?;

        if let Some(existing) = record.certificate {
            return Ok(Some(existing));
        }

        if !gates::certificate_conditions_met(&self.catalog, &record) {
            return Ok(None);
        }

        let certificate = Certificate {
            issued_at: Utc::now(),
            document_ref: self.documents.certificate_url(&student_id)?,
        };
        let issued = self.students.issue_certificate(&student_id, certificate)?;
        info!(student = %student_id, "certificate issued");

        Ok(Some(issued))
    }

    /// Admin listing of every student's workflow position.
    pub fn students_progress(
        &self,
        limit: usize,
    ) -> Result<Vec<StudentProgressView>, WorkflowError> {
        let records = self.students.all(limit)?;
        Ok(records
            .iter()
            .map(|record| record.progress_view(&self.catalog))
            .collect())
    }

    /// Admin listing of purchases awaiting project validation.
    pub fn pending_validation(
        &self,
        limit: usize,
    ) -> Result<Vec<StudentProgressView>, WorkflowError> {
        let records = self.students.pending_validation(limit)?;
        Ok(records
            .iter()
            .map(|record| record.progress_view(&self.catalog))
            .collect())
    }

    fn fetch_record(&self, student_id: StudentId) -> Result<StudentRecord, WorkflowError> {
        Ok(self
            .students
            .fetch(&student_id)?
            .ok_or(NotFoundError::Student(student_id))?)
    }

    /// Atomic read-modify-write against one student, mapping the store's
    /// missing-record error onto the workflow taxonomy.
    fn mutate_record<F, T>(&self, student_id: StudentId, apply: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut StudentRecord) -> T,
    {
        match self.students.mutate(&student_id, apply) {
            Ok(value) => Ok(value),
            Err(RepositoryError::NotFound) => Err(NotFoundError::Student(student_id).into()),
            Err(err) => Err(err.into()),
        }
    }
}

fn hash_password(password: &str) -> Result<String, WorkflowError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| WorkflowError::Credential)?;
    Ok(hash.to_string())
}
