use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::workflows::certification::catalog::ModuleCatalog;
use crate::workflows::certification::domain::{
    Candidate, CandidateId, CandidateSubmission, Certificate, ContactDetails, DeviceReadiness,
    DisabilityDisclosure, Student, StudentId,
};
use crate::workflows::certification::intake::Questionnaire;
use crate::workflows::certification::repository::{
    CandidateRepository, DocumentStore, DocumentStoreError, RepositoryError, StudentRecord,
    StudentRepository,
};
use crate::workflows::certification::router::{Caller, CallerResolver};
use crate::workflows::certification::service::{CertificationService, RegistrationRequest};

pub(super) const ADMIN_TOKEN: &str = "admin-token";

pub(super) fn contact() -> ContactDetails {
    ContactDetails {
        full_name: "Jordan Leblanc".to_string(),
        email: "jordan.leblanc@example.com".to_string(),
        phone: "+33 6 12 34 56 78".to_string(),
    }
}

/// First listed option for every question; structurally complete by design.
pub(super) fn answers() -> BTreeMap<String, String> {
    Questionnaire::standard()
        .questions()
        .iter()
        .map(|question| (question.key.to_string(), question.options[0].to_string()))
        .collect()
}

pub(super) fn submission() -> CandidateSubmission {
    CandidateSubmission {
        contact: contact(),
        answers: answers(),
        professional_project: "I want to build an independent vehicle inspection practice covering my whole region.".to_string(),
        license_attested: true,
        disability: DisabilityDisclosure::None,
        device: DeviceReadiness::ModernSmartphone,
    }
}

pub(super) type TestService = CertificationService<MemoryCandidates, MemoryStudents, MemoryDocs>;

pub(super) fn build_service() -> (TestService, Arc<MemoryCandidates>, Arc<MemoryStudents>) {
    let candidates = Arc::new(MemoryCandidates::default());
    let students = Arc::new(MemoryStudents::default());
    let documents = Arc::new(MemoryDocs::default());
    let service = CertificationService::new(
        candidates.clone(),
        students.clone(),
        documents,
        ModuleCatalog::standard(),
    );
    (service, candidates, students)
}

pub(super) fn qualified_candidate(service: &TestService) -> Candidate {
    service
        .submit_questionnaire(submission())
        .expect("submission persists")
}

pub(super) fn registered_student(service: &TestService) -> Student {
    let candidate = qualified_candidate(service);
    service
        .register(
            candidate.id,
            RegistrationRequest {
                email: candidate.contact.email.clone(),
                password: "correct-horse-battery".to_string(),
            },
        )
        .expect("registration succeeds")
}

pub(super) fn validated_student(service: &TestService) -> Student {
    let student = registered_student(service);
    service
        .confirm_purchase(student.id)
        .expect("purchase confirmed");
    service
        .validate_project(student.id, true, Some("solid project".to_string()))
        .expect("project approved");
    student
}

/// Drive every catalog module to passed + completed, in order.
pub(super) fn pass_all_modules(service: &TestService, student_id: StudentId) {
    let modules: Vec<_> = service.catalog().modules().to_vec();
    for module in modules {
        service
            .record_quiz_attempt(student_id, &module.id, 90)
            .expect("quiz attempt allowed");
        service
            .mark_complete(student_id, &module.id)
            .expect("completion allowed");
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryCandidates {
    records: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
}

impl CandidateRepository for MemoryCandidates {
    fn insert(&self, candidate: Candidate) -> Result<Candidate, RepositoryError> {
        let mut guard = self.records.lock().expect("candidate mutex poisoned");
        if guard.contains_key(&candidate.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.records.lock().expect("candidate mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStudents {
    records: Arc<Mutex<HashMap<StudentId, StudentRecord>>>,
}

impl StudentRepository for MemoryStudents {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("student mutex poisoned");
        let duplicate = guard.contains_key(&record.student.id)
            || guard
                .values()
                .any(|existing| existing.student.candidate_id == record.student.candidate_id);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.student.id, record.clone());
        Ok(record)
    }

    fn mutate<F, T>(&self, id: &StudentId, apply: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut StudentRecord) -> T,
    {
        let mut guard = self.records.lock().expect("student mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        Ok(apply(record))
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard
            .values()
            .find(|record| &record.student.candidate_id == id)
            .cloned())
    }

    fn pending_validation(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.student.enrollment.validation_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    fn all(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("student mutex poisoned");
        Ok(guard.values().take(limit).cloned().collect())
    }

    fn issue_certificate(
        &self,
        id: &StudentId,
        certificate: Certificate,
    ) -> Result<Certificate, RepositoryError> {
        let mut guard = self.records.lock().expect("student mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if let Some(existing) = &record.certificate {
            return Ok(existing.clone());
        }
        record.certificate = Some(certificate.clone());
        Ok(certificate)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDocs;

impl DocumentStore for MemoryDocs {
    fn store_license(
        &self,
        student: &StudentId,
        file_name: &str,
        _content: &[u8],
    ) -> Result<String, DocumentStoreError> {
        Ok(format!("memory://licenses/{student}/{file_name}"))
    }

    fn certificate_url(&self, student: &StudentId) -> Result<String, DocumentStoreError> {
        Ok(format!("memory://certificates/{student}.pdf"))
    }
}

/// Dev-grade resolver used by the router tests: the admin token is fixed and
/// any well-formed student id doubles as that student's token.
pub(super) struct TestResolver;

impl CallerResolver for TestResolver {
    fn resolve(&self, token: &str) -> Option<Caller> {
        if token == ADMIN_TOKEN {
            return Some(Caller::Admin);
        }
        token.parse::<Uuid>().ok().map(StudentId).map(Caller::Student)
    }
}
