use crate::infra::{
    InMemoryCandidateRepository, InMemoryDocumentStore, InMemoryStudentRepository,
};
use academy::error::AppError;
use academy::workflows::certification::{
    CandidateSubmission, CertificationService, ContactDetails, DeviceReadiness,
    DisabilityDisclosure, LicenseUpload, ModuleCatalog, Questionnaire, RegistrationRequest,
};
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Quiz score applied to every module during the walkthrough (0-100)
    #[arg(long, default_value_t = 88)]
    pub(crate) quiz_score: u16,
    /// File name used for the simulated license upload
    #[arg(long, default_value = "driving-license.png")]
    pub(crate) license_file: String,
    /// Skip the rejected-questionnaire illustration at the start
    #[arg(long)]
    pub(crate) skip_rejection: bool,
}

type DemoService = CertificationService<
    InMemoryCandidateRepository,
    InMemoryStudentRepository,
    InMemoryDocumentStore,
>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        quiz_score,
        license_file,
        skip_rejection,
    } = args;

    let service: DemoService = CertificationService::new(
        Arc::new(InMemoryCandidateRepository::default()),
        Arc::new(InMemoryStudentRepository::default()),
        Arc::new(InMemoryDocumentStore::default()),
        ModuleCatalog::standard(),
    );

    println!("Inspector academy workflow demo");

    if !skip_rejection {
        println!("\nStep 0: a submission without the license attestation is screened out");
        let mut rejected = demo_submission();
        rejected.license_attested = false;
        match service.submit_questionnaire(rejected) {
            Ok(candidate) => {
                println!("- Candidate {} recorded, passed={}", candidate.id, candidate.verdict.passed);
                for reason in &candidate.verdict.failed_reasons {
                    println!("  reason: {reason:?}");
                }
            }
            Err(err) => {
                println!("  Submission unavailable: {err}");
                return Ok(());
            }
        }
    }

    println!("\nStep 1: qualification intake");
    let candidate = match service.submit_questionnaire(demo_submission()) {
        Ok(candidate) => candidate,
        Err(err) => {
            println!("  Submission unavailable: {err}");
            return Ok(());
        }
    };
    println!("- Candidate {} qualified", candidate.id);

    println!("\nStep 2: account provisioning");
    let student = match service.register(
        candidate.id,
        RegistrationRequest {
            email: candidate.contact.email.clone(),
            password: "demo-password-123".to_string(),
        },
    ) {
        Ok(student) => student,
        Err(err) => {
            println!("  Registration failed: {err}");
            return Ok(());
        }
    };
    println!("- Student {} provisioned (unpaid)", student.id);

    println!("\nStep 3: paid content stays locked until the enrollment gate clears");
    let first_paid = service
        .catalog()
        .modules()
        .iter()
        .find(|module| !module.free)
        .cloned();
    if let Some(module) = first_paid {
        match service.mark_complete(student.id, &module.id) {
            Ok(_) => println!("- Unexpectedly allowed access to '{}'", module.id),
            Err(err) => println!("- '{}' refused as expected: {err}", module.id),
        }
    }

    println!("\nStep 4: purchase signal and project validation");
    if let Err(err) = service.confirm_purchase(student.id) {
        println!("  Purchase signal failed: {err}");
        return Ok(());
    }
    match service.validate_project(student.id, true, Some("demo approval".to_string())) {
        Ok(status) => println!("- Enrollment validated: is_validated={}", status.is_validated),
        Err(err) => {
            println!("  Validation failed: {err}");
            return Ok(());
        }
    }

    println!("\nStep 5: module progression in catalog order");
    let modules: Vec<_> = service.catalog().modules().to_vec();
    for module in &modules {
        match service.record_quiz_attempt(student.id, &module.id, quiz_score) {
            Ok(view) => println!(
                "- '{}' quiz {} -> passed={}",
                module.id,
                quiz_score,
                view.passed
            ),
            Err(err) => {
                println!("  Quiz on '{}' failed: {err}", module.id);
                return Ok(());
            }
        }
        if let Err(err) = service.mark_complete(student.id, &module.id) {
            println!("  Completion on '{}' failed: {err}", module.id);
            return Ok(());
        }
    }

    println!("\nStep 6: compliance document upload");
    let content_type = mime_guess::from_path(&license_file)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    match service.upload_license(
        student.id,
        LicenseUpload {
            file_name: license_file,
            content_type,
            data: vec![0u8; 1024],
        },
    ) {
        Ok(document) => println!(
            "- Stored '{}' ({}) at {}",
            document.file_name, document.content_type, document.storage_key
        ),
        Err(err) => {
            println!("  Upload rejected: {err}");
            return Ok(());
        }
    }

    println!("\nStep 7: practical assessment");
    match service.assign_code(student.id, "WPV-DEMO-01".to_string()) {
        Ok(assessment) => println!("- Assigned code {}", assessment.code),
        Err(err) => {
            println!("  Code assignment failed: {err}");
            return Ok(());
        }
    }
    if let Err(err) = service.validate_result(student.id, true, Some("clean report".to_string())) {
        println!("  Result validation failed: {err}");
        return Ok(());
    }
    println!("- Practical result approved");

    println!("\nStep 8: satisfaction questionnaire closes the chain");
    match service.record_satisfaction(student.id, true) {
        Ok(Some(certificate)) => println!(
            "- Certificate issued at {} -> {}",
            certificate.issued_at, certificate.document_ref
        ),
        Ok(None) => println!("- Certificate withheld: some gate is still open"),
        Err(err) => {
            println!("  Satisfaction recording failed: {err}");
            return Ok(());
        }
    }

    println!("\nAdmin progress snapshot");
    match service.students_progress(10) {
        Ok(rows) => match serde_json::to_string_pretty(&rows) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  Snapshot unavailable: {err}"),
        },
        Err(err) => println!("  Snapshot unavailable: {err}"),
    }

    Ok(())
}

fn demo_submission() -> CandidateSubmission {
    let answers: BTreeMap<String, String> = Questionnaire::standard()
        .questions()
        .iter()
        .map(|question| (question.key.to_string(), question.options[0].to_string()))
        .collect();

    CandidateSubmission {
        contact: ContactDetails {
            full_name: "Demo Learner".to_string(),
            email: "demo.learner@example.com".to_string(),
            phone: "+33 7 00 11 22 33".to_string(),
        },
        answers,
        professional_project:
            "Build a full-time independent vehicle inspection activity serving fleet customers."
                .to_string(),
        license_attested: true,
        disability: DisabilityDisclosure::None,
        device: DeviceReadiness::ModernSmartphone,
    }
}
