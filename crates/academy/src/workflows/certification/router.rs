use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{CandidateId, CandidateSubmission, ModuleId, StudentId};
use super::repository::{CandidateRepository, DocumentStore, StudentRepository};
use super::service::{
    CertificationService, LicenseUpload, RegistrationRequest, WorkflowError,
};

const DEFAULT_LISTING_LIMIT: usize = 50;

/// Authenticated identity behind a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Student(StudentId),
    Admin,
}

/// Seam to whatever issues and stores tokens; the workflow only needs to map
/// a presented token to a caller.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Caller>;
}

/// Shared router state: the service plus the token resolver.
pub struct RouterState<C, S, D> {
    service: Arc<CertificationService<C, S, D>>,
    resolver: Arc<dyn CallerResolver>,
}

impl<C, S, D> Clone for RouterState<C, S, D> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

/// Router builder exposing the full workflow surface.
pub fn certification_router<C, S, D>(
    service: Arc<CertificationService<C, S, D>>,
    resolver: Arc<dyn CallerResolver>,
) -> Router
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let state = RouterState { service, resolver };

    Router::new()
        .route("/pre-registration/submit", post(submit_handler::<C, S, D>))
        .route("/auth/register", post(register_handler::<C, S, D>))
        .route("/user/access-status", get(access_status_handler::<C, S, D>))
        .route("/user/upload-license", post(upload_license_handler::<C, S, D>))
        .route("/user/satisfaction", post(satisfaction_handler::<C, S, D>))
        .route("/modules", get(list_modules_handler::<C, S, D>))
        .route("/modules/:module_id", get(module_handler::<C, S, D>))
        .route(
            "/progress/:module_id/complete",
            post(mark_complete_handler::<C, S, D>),
        )
        .route(
            "/progress/:module_id/quiz",
            post(quiz_attempt_handler::<C, S, D>),
        )
        .route(
            "/admin/students/progress",
            get(admin_progress_handler::<C, S, D>),
        )
        .route(
            "/admin/students/pending-validation",
            get(admin_pending_handler::<C, S, D>),
        )
        .route(
            "/admin/students/:student_id/mark-purchased",
            post(admin_mark_purchased_handler::<C, S, D>),
        )
        .route(
            "/admin/students/:student_id/validate",
            post(admin_validate_project_handler::<C, S, D>),
        )
        .route(
            "/admin/students/:student_id/weproov-code",
            post(admin_assign_code_handler::<C, S, D>),
        )
        .route(
            "/admin/students/:student_id/validate-inspection",
            post(admin_validate_inspection_handler::<C, S, D>),
        )
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "missing or unrecognized bearer token" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn forbidden() -> Response {
    let payload = json!({ "error": "admin credentials required" });
    (StatusCode::FORBIDDEN, Json(payload)).into_response()
}

fn caller(resolver: &dyn CallerResolver, headers: &HeaderMap) -> Result<Caller, Response> {
    let token = bearer_token(headers).ok_or_else(unauthorized)?;
    resolver.resolve(token).ok_or_else(unauthorized)
}

fn student_caller(resolver: &dyn CallerResolver, headers: &HeaderMap) -> Result<StudentId, Response> {
    match caller(resolver, headers)? {
        Caller::Student(id) => Ok(id),
        Caller::Admin => Err(forbidden()),
    }
}

fn admin_caller(resolver: &dyn CallerResolver, headers: &HeaderMap) -> Result<(), Response> {
    match caller(resolver, headers)? {
        Caller::Admin => Ok(()),
        Caller::Student(_) => Err(forbidden()),
    }
}

fn error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Gate(_) => StatusCode::FORBIDDEN,
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Repository(_) | WorkflowError::Storage(_) | WorkflowError::Credential => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    // Duplicate single-shot actions read as "already done", not failures.
    let payload = if matches!(error, WorkflowError::Conflict(_)) {
        json!({ "error": error.to_string(), "already_done": true })
    } else {
        json!({ "error": error.to_string() })
    };

    (status, Json(payload)).into_response()
}

fn parse_student_id(raw: &str) -> Result<StudentId, Response> {
    raw.parse::<Uuid>().map(StudentId).map_err(|_| {
        let payload = json!({ "error": format!("'{raw}' is not a valid student id") });
        (StatusCode::NOT_FOUND, Json(payload)).into_response()
    })
}

async fn submit_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    Json(submission): Json<CandidateSubmission>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    match state.service.submit_questionnaire(submission) {
        Ok(candidate) => {
            let payload = json!({
                "candidate_id": candidate.id,
                "passed": candidate.verdict.passed,
                "failed_reasons": candidate.verdict.failed_reasons,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    candidate_id: CandidateId,
    email: String,
    password: String,
}

async fn register_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    Json(body): Json<RegisterBody>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let request = RegistrationRequest {
        email: body.email,
        password: body.password,
    };

    match state.service.register(body.candidate_id, request) {
        Ok(student) => {
            let payload = json!({
                "student_id": student.id,
                "email": student.email,
                "has_purchased": student.enrollment.has_purchased(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn access_status_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.access_status(student_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn upload_license_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let file_name = field.file_name().unwrap_or("license").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(data) => {
                        upload = Some(LicenseUpload {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        });
                        break;
                    }
                    Err(error) => {
                        let payload = json!({ "error": format!("malformed upload: {error}") });
                        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(error) => {
                let payload = json!({ "error": format!("malformed upload: {error}") });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
        }
    }

    let Some(upload) = upload else {
        let payload = json!({ "error": "multipart field 'file' is required" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    };

    match state.service.upload_license(student_id, upload) {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct SatisfactionBody {
    completed: bool,
}

async fn satisfaction_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Json(body): Json<SatisfactionBody>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.record_satisfaction(student_id, body.completed) {
        Ok(certificate) => {
            let payload = json!({ "completed": body.completed, "certificate": certificate });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn list_modules_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.list_modules(student_id) {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn module_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.module_view(student_id, &ModuleId(module_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn mark_complete_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.mark_complete(student_id, &ModuleId(module_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct QuizBody {
    score: u16,
}

async fn quiz_attempt_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
    Json(body): Json<QuizBody>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    let student_id = match student_caller(state.resolver.as_ref(), &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .service
        .record_quiz_attempt(student_id, &ModuleId(module_id), body.score)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn admin_progress_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }

    let limit = query.limit.unwrap_or(DEFAULT_LISTING_LIMIT);
    match state.service.students_progress(limit) {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn admin_pending_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }

    let limit = query.limit.unwrap_or(DEFAULT_LISTING_LIMIT);
    match state.service.pending_validation(limit) {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn admin_mark_purchased_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }
    let student_id = match parse_student_id(&student_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.confirm_purchase(student_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct ValidationQuery {
    validated: bool,
    notes: Option<String>,
}

async fn admin_validate_project_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
    Query(query): Query<ValidationQuery>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }
    let student_id = match parse_student_id(&student_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .service
        .validate_project(student_id, query.validated, query.notes)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
struct CodeQuery {
    code: String,
}

async fn admin_assign_code_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
    Query(query): Query<CodeQuery>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }
    let student_id = match parse_student_id(&student_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.assign_code(student_id, query.code) {
        Ok(assessment) => (StatusCode::CREATED, Json(assessment)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn admin_validate_inspection_handler<C, S, D>(
    State(state): State<RouterState<C, S, D>>,
    headers: HeaderMap,
    Path(student_id): Path<String>,
    Query(query): Query<ValidationQuery>,
) -> Response
where
    C: CandidateRepository + 'static,
    S: StudentRepository + 'static,
    D: DocumentStore + 'static,
{
    if let Err(response) = admin_caller(state.resolver.as_ref(), &headers) {
        return response;
    }
    let student_id = match parse_student_id(&student_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .service
        .validate_result(student_id, query.validated, query.notes)
    {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(error) => error_response(error),
    }
}
