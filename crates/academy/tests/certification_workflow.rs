//! End-to-end walkthrough of the qualification-to-certification workflow,
//! exercised through the public HTTP surface, plus the concurrent-issuance
//! guarantee at the service level.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::thread;

use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use academy::workflows::certification::{
    certification_router, Caller, CallerResolver, Candidate, CandidateId, CandidateRepository,
    CandidateSubmission, Certificate, CertificationService, ContactDetails, DeviceReadiness,
    DisabilityDisclosure, DocumentStore, DocumentStoreError, LicenseUpload, ModuleCatalog,
    ModuleId, Questionnaire, RegistrationRequest, RepositoryError, StudentId, StudentRecord,
    StudentRepository,
};

const ADMIN_TOKEN: &str = "workflow-admin";

#[derive(Default)]
struct Candidates(Mutex<HashMap<CandidateId, Candidate>>);

impl CandidateRepository for Candidates {
    fn insert(&self, candidate: Candidate) -> Result<Candidate, RepositoryError> {
        let mut guard = self.0.lock().expect("candidate mutex poisoned");
        if guard.contains_key(&candidate.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .expect("candidate mutex poisoned")
            .get(id)
            .cloned())
    }
}

#[derive(Default)]
struct Students(Mutex<HashMap<StudentId, StudentRecord>>);

impl StudentRepository for Students {
    fn insert(&self, record: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = self.0.lock().expect("student mutex poisoned");
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
        let mut guard = self.0.lock().expect("student mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        Ok(apply(record))
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .expect("student mutex poisoned")
            .get(id)
            .cloned())
    }

    fn find_by_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .expect("student mutex poisoned")
            .values()
            .find(|record| &record.student.candidate_id == id)
            .cloned())
    }

    fn pending_validation(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .expect("student mutex poisoned")
            .values()
            .filter(|record| record.student.enrollment.validation_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    fn all(&self, limit: usize) -> Result<Vec<StudentRecord>, RepositoryError> {
        Ok(self
            .0
            .lock()
            .expect("student mutex poisoned")
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    fn issue_certificate(
        &self,
        id: &StudentId,
        certificate: Certificate,
    ) -> Result<Certificate, RepositoryError> {
        let mut guard = self.0.lock().expect("student mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if let Some(existing) = &record.certificate {
            return Ok(existing.clone());
        }
        record.certificate = Some(certificate.clone());
        Ok(certificate)
    }
}

#[derive(Default)]
struct Documents;

impl DocumentStore for Documents {
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

struct Resolver;

impl CallerResolver for Resolver {
    fn resolve(&self, token: &str) -> Option<Caller> {
        if token == ADMIN_TOKEN {
            return Some(Caller::Admin);
        }
        token.parse::<Uuid>().ok().map(StudentId).map(Caller::Student)
    }
}

type Service = CertificationService<Candidates, Students, Documents>;

fn build_service() -> Arc<Service> {
    Arc::new(CertificationService::new(
        Arc::new(Candidates::default()),
        Arc::new(Students::default()),
        Arc::new(Documents::default()),
        ModuleCatalog::standard(),
    ))
}

fn build_app(service: Arc<Service>) -> Router {
    certification_router(service, Arc::new(Resolver))
}

fn submission() -> CandidateSubmission {
    let answers: BTreeMap<String, String> = Questionnaire::standard()
        .questions()
        .iter()
        .map(|question| (question.key.to_string(), question.options[0].to_string()))
        .collect();

    CandidateSubmission {
        contact: ContactDetails {
            full_name: "Sacha Morel".to_string(),
            email: "sacha.morel@example.com".to_string(),
            phone: "06 11 22 33 44".to_string(),
        },
        answers,
        professional_project:
            "Full-time remote vehicle inspections across the region, starting this quarter."
                .to_string(),
        license_attested: true,
        disability: DisabilityDisclosure::Decline,
        device: DeviceReadiness::ModernSmartphone,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("infallible router");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}

fn json_post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn full_workflow_over_http() {
    let service = build_service();
    let app = build_app(service.clone());

    // Qualification intake.
    let body = serde_json::to_value(submission()).expect("serializable");
    let (status, verdict) = send(&app, json_post("/pre-registration/submit", None, body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(verdict["passed"], json!(true));
    let candidate_id = verdict["candidate_id"].as_str().expect("id present").to_string();

    // Account provisioning.
    let (status, account) = send(
        &app,
        json_post(
            "/auth/register",
            None,
            json!({
                "candidate_id": candidate_id,
                "email": "sacha.morel@example.com",
                "password": "long-enough-password",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = account["student_id"].as_str().expect("id present").to_string();

    // Enrollment gate: purchase signal then project validation.
    let (status, _) = send(
        &app,
        json_post(
            &format!("/admin/students/{token}/mark-purchased"),
            Some(ADMIN_TOKEN),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, access) = send(
        &app,
        json_post(
            &format!("/admin/students/{token}/validate?validated=true"),
            Some(ADMIN_TOKEN),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["is_validated"], json!(true));

    // Module progression, in catalog order.
    for module in [
        "getting-started",
        "inspection-basics",
        "damage-identification",
        "report-production",
        "client-relations",
    ] {
        let (status, attempt) = send(
            &app,
            json_post(
                &format!("/progress/{module}/quiz"),
                Some(&token),
                json!({ "score": 90 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "quiz on {module}");
        assert_eq!(attempt["passed"], json!(true));

        let (status, _) = send(
            &app,
            json_post(&format!("/progress/{module}/complete"), Some(&token), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "completion on {module}");
    }

    // Compliance document.
    let boundary = "workflow-boundary";
    let multipart = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"license.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4 fake\r\n\
         --{boundary}--\r\n"
    );
    let upload = Request::builder()
        .method("POST")
        .uri("/user/upload-license")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart))
        .expect("request builds");
    let (status, document) = send(&app, upload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(document["content_type"], json!("application/pdf"));

    // Practical assessment: code assignment then result validation.
    let (status, assessment) = send(
        &app,
        json_post(
            &format!("/admin/students/{token}/weproov-code?code=WPV-3310"),
            Some(ADMIN_TOKEN),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assessment["result"], json!("pending"));

    let (status, assessment) = send(
        &app,
        json_post(
            &format!("/admin/students/{token}/validate-inspection?validated=true"),
            Some(ADMIN_TOKEN),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assessment["result"], json!("approved"));

    // Satisfaction gate cascades straight into issuance.
    let (status, outcome) = send(
        &app,
        json_post("/user/satisfaction", Some(&token), json!({ "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(outcome["certificate"]["issued_at"].as_str().is_some());

    let (status, profile) = send(&app, get("/user/access-status", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        profile["certificate_url"],
        json!(format!("memory://certificates/{token}.pdf"))
    );
}

#[test]
fn concurrent_evaluation_issues_exactly_one_certificate() {
    let service = build_service();

    let candidate = service
        .submit_questionnaire(submission())
        .expect("submission persists");
    let student = service
        .register(
            candidate.id,
            RegistrationRequest {
                email: candidate.contact.email.clone(),
                password: "long-enough-password".to_string(),
            },
        )
        .expect("registration succeeds");

    service.confirm_purchase(student.id).expect("purchased");
    service
        .validate_project(student.id, true, None)
        .expect("approved");
    let modules: Vec<_> = service.catalog().modules().to_vec();
    for module in modules {
        service
            .record_quiz_attempt(student.id, &module.id, 95)
            .expect("quiz allowed");
        service
            .mark_complete(student.id, &module.id)
            .expect("completion allowed");
    }
    service
        .upload_license(
            student.id,
            LicenseUpload {
                file_name: "license.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                data: vec![0u8; 64],
            },
        )
        .expect("license accepted");
    service
        .assign_code(student.id, "WPV-0099".to_string())
        .expect("code assigned");
    service
        .validate_result(student.id, true, None)
        .expect("practical approved");

    // Every concurrent caller flips the final gate and races to issue.
    let issued: Vec<Certificate> = thread::scope(|scope| {
        (0..8)
            .map(|_| {
                let service = service.clone();
                scope.spawn(move || {
                    service
                        .record_satisfaction(student.id, true)
                        .expect("satisfaction recorded")
                        .expect("all gates satisfied")
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().expect("issuer thread panicked"))
            .collect()
    });

    let winner = &issued[0];
    assert!(issued
        .iter()
        .all(|certificate| certificate.issued_at == winner.issued_at
            && certificate.document_ref == winner.document_ref));

    let finale = service
        .evaluate(student.id)
        .expect("evaluation succeeds")
        .expect("certificate persisted");
    assert_eq!(finale.issued_at, winner.issued_at);
}

#[test]
fn concurrent_writers_preserve_each_others_gates() {
    let service = build_service();

    let candidate = service
        .submit_questionnaire(submission())
        .expect("submission persists");
    let student = service
        .register(
            candidate.id,
            RegistrationRequest {
                email: candidate.contact.email.clone(),
                password: "long-enough-password".to_string(),
            },
        )
        .expect("registration succeeds");
    service.confirm_purchase(student.id).expect("purchased");

    let free_module = ModuleId::new("getting-started");

    // Quiz writes, the admin approval, and the license upload all land on the
    // same record at once; none may be lost and the best score may only grow.
    thread::scope(|scope| {
        let quizzes = scope.spawn(|| {
            for score in [55, 95, 40, 70] {
                service
                    .record_quiz_attempt(student.id, &free_module, score)
                    .expect("free module quiz allowed");
            }
        });
        let review = scope.spawn(|| {
            service
                .validate_project(student.id, true, Some("checked".to_string()))
                .expect("approval recorded");
        });
        let upload = scope.spawn(|| {
            service
                .upload_license(
                    student.id,
                    LicenseUpload {
                        file_name: "license.png".to_string(),
                        content_type: "image/png".to_string(),
                        data: vec![0u8; 32],
                    },
                )
                .expect("license accepted");
        });

        quizzes.join().expect("quiz thread panicked");
        review.join().expect("review thread panicked");
        upload.join().expect("upload thread panicked");
    });

    let status = service.access_status(student.id).expect("status readable");
    assert!(status.has_purchased);
    assert!(status.is_validated);
    assert_eq!(status.validation_notes.as_deref(), Some("checked"));

    let view = service
        .module_view(student.id, &free_module)
        .expect("free module readable");
    assert_eq!(view.best_quiz_score, Some(95));

    let rows = service.students_progress(10).expect("listable");
    assert!(rows[0].license_uploaded);
}
