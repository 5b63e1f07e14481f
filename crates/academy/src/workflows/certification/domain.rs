use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a questionnaire submission prior to account creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub Uuid);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an enrolled learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(pub Uuid);

impl StudentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StudentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog key for a training module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contact data collected with the qualification questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Self-reported disability disclosure. `Decline` is a valid, recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabilityDisclosure {
    None,
    Yes,
    Decline,
}

/// Declared readiness of the candidate's field equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceReadiness {
    ModernSmartphone,
    OldSmartphone,
    None,
}

/// Raw questionnaire submission as received from the funnel.
///
/// Answers are keyed by question key and validated against the fixed
/// questionnaire during intake; unrecognized keys or option values are
/// rejected with field-level reason codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSubmission {
    pub contact: ContactDetails,
    pub answers: BTreeMap<String, String>,
    pub professional_project: String,
    pub license_attested: bool,
    pub disability: DisabilityDisclosure,
    pub device: DeviceReadiness,
}

/// Field-level reason codes attached to a failed eligibility verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ReasonCode {
    MissingFullName,
    MissingEmail,
    InvalidPhone,
    IncompleteQuestionnaire { answered: usize, required: usize },
    MissingAnswer { question: String },
    UnknownQuestion { key: String },
    UnknownAnswer { question: String, value: String },
    ProjectTooShort { length: usize, minimum: usize },
    LicenseNotAttested,
}

/// Eligibility decision computed exactly once per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub passed: bool,
    pub failed_reasons: Vec<ReasonCode>,
}

impl EligibilityVerdict {
    pub fn from_reasons(failed_reasons: Vec<ReasonCode>) -> Self {
        Self {
            passed: failed_reasons.is_empty(),
            failed_reasons,
        }
    }
}

/// Immutable snapshot of a submission plus its verdict.
///
/// Rejected candidates are retained alongside accepted ones for audit; a
/// corrected submission creates a new candidate rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub contact: ContactDetails,
    pub answers: BTreeMap<String, String>,
    pub professional_project: String,
    pub license_attested: bool,
    pub disability: DisabilityDisclosure,
    pub device: DeviceReadiness,
    pub verdict: EligibilityVerdict,
    pub submitted_at: DateTime<Utc>,
}

/// Shared tri-state for admin review decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

/// Enrollment gate state for paid content.
///
/// A tagged union rather than independent booleans: a student cannot be
/// "validated but never purchased" or "pending without a purchase" by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EnrollmentState {
    Unpaid,
    PendingReview,
    Approved { notes: Option<String> },
    Rejected { notes: Option<String> },
}

impl EnrollmentState {
    pub fn has_purchased(&self) -> bool {
        !matches!(self, EnrollmentState::Unpaid)
    }

    pub fn validation_pending(&self) -> bool {
        matches!(self, EnrollmentState::PendingReview)
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, EnrollmentState::Approved { .. })
    }

    pub fn review_status(&self) -> ReviewStatus {
        match self {
            EnrollmentState::Unpaid | EnrollmentState::PendingReview => ReviewStatus::Pending,
            EnrollmentState::Approved { .. } => ReviewStatus::Approved,
            EnrollmentState::Rejected { .. } => ReviewStatus::Rejected,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            EnrollmentState::Approved { notes } | EnrollmentState::Rejected { notes } => {
                notes.as_deref()
            }
            _ => None,
        }
    }
}

/// The enrolled identity produced by account provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: StudentId,
    pub candidate_id: CandidateId,
    pub email: String,
    pub password_hash: String,
    pub enrollment: EnrollmentState,
    pub disability: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(candidate: &Candidate, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: StudentId::new(),
            candidate_id: candidate.id,
            email: candidate.contact.email.clone(),
            password_hash,
            enrollment: EnrollmentState::Unpaid,
            disability: matches!(candidate.disability, DisabilityDisclosure::Yes),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Static catalog entry for a training module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    pub index: u16,
    pub title: String,
    pub free: bool,
    pub pass_mark: u8,
}

/// Per-student progress against one catalog module.
///
/// Both fields only move forward: completion is permanent and the best quiz
/// score never regresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub completed_at: Option<DateTime<Utc>>,
    pub best_quiz_score: Option<u8>,
}

impl ModuleProgress {
    pub fn passed(&self, module: &ModuleDefinition) -> bool {
        self.best_quiz_score
            .map(|score| score >= module.pass_mark)
            .unwrap_or(false)
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
    }

    pub fn record_score(&mut self, score: u8) {
        let best = self.best_quiz_score.map_or(score, |prior| prior.max(score));
        self.best_quiz_score = Some(best);
    }
}

/// Current regulatory document on file; re-upload replaces the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// External practical test tracking. The code is immutable once assigned;
/// the result stays re-validatable by admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticalAssessment {
    pub code: String,
    pub assigned_at: DateTime<Utc>,
    pub result: ReviewStatus,
    pub notes: Option<String>,
}

impl PracticalAssessment {
    pub fn assigned(code: String) -> Self {
        Self {
            code,
            assigned_at: Utc::now(),
            result: ReviewStatus::Pending,
            notes: None,
        }
    }
}

/// Terminal artifact, issued exactly once and never revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub issued_at: DateTime<Utc>,
    pub document_ref: String,
}
