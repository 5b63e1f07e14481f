use academy::workflows::certification::{
    Caller, CallerResolver, Candidate, CandidateId, CandidateRepository, Certificate,
    DocumentStore, DocumentStoreError, RepositoryError, StudentId, StudentRecord,
    StudentRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCandidateRepository {
    records: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
}

impl CandidateRepository for InMemoryCandidateRepository {
    fn insert(&self, candidate: Candidate) -> Result<Candidate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&candidate.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStudentRepository {
    records: Arc<Mutex<HashMap<StudentId, StudentRecord>>>,
}

impl StudentRepository for InMemoryStudentRepository {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
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
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        Ok(apply(record))
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| &record.student.candidate_id == id)
            .cloned())
    }

    fn pending_validation(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.student.enrollment.validation_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    fn all(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().take(limit).cloned().collect())
    }

    fn issue_certificate(
        &self,
        id: &StudentId,
        certificate: Certificate,
    ) -> Result<Certificate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if let Some(existing) = &record.certificate {
            return Ok(existing.clone());
        }
        record.certificate = Some(certificate.clone());
        Ok(certificate)
    }
}

/// Keeps uploaded documents in memory and hands out stable pseudo-URLs.
/// Stands in for the object store until one is wired up.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl DocumentStore for InMemoryDocumentStore {
    fn store_license(
        &self,
        student: &StudentId,
        file_name: &str,
        content: &[u8],
    ) -> Result<String, DocumentStoreError> {
        let key = format!("memory://licenses/{student}/{file_name}");
        let mut guard = self.objects.lock().expect("document mutex poisoned");
        guard.insert(key.clone(), content.to_vec());
        Ok(key)
    }

    fn certificate_url(&self, student: &StudentId) -> Result<String, DocumentStoreError> {
        Ok(format!("memory://certificates/{student}.pdf"))
    }
}

/// Development token scheme: one shared admin token from configuration, and
/// each student's own id string doubles as their bearer token. A real issuer
/// plugs in behind [`CallerResolver`] without touching the router.
pub(crate) struct StaticCallerResolver {
    admin_token: String,
}

impl StaticCallerResolver {
    pub(crate) fn new(admin_token: String) -> Self {
        Self { admin_token }
    }
}

impl CallerResolver for StaticCallerResolver {
    fn resolve(&self, token: &str) -> Option<Caller> {
        if token == self.admin_token {
            return Some(Caller::Admin);
        }
        token
            .parse::<Uuid>()
            .ok()
            .map(StudentId)
            .map(Caller::Student)
    }
}
