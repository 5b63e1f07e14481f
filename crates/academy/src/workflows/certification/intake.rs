use chrono::Utc;

use super::domain::{Candidate, CandidateId, CandidateSubmission, EligibilityVerdict, ReasonCode};

/// Minimum free-text length for the professional-project statement.
const MIN_PROJECT_CHARS: usize = 50;
/// Minimum number of digits for a usable callback phone number.
const MIN_PHONE_DIGITS: usize = 10;

/// One questionnaire entry: a stable key and its closed option set.
#[derive(Debug, Clone, Copy)]
pub struct QuestionSpec {
    pub key: &'static str,
    pub options: &'static [&'static str],
}

/// The fixed ten-question qualification form.
///
/// Answers outside these keys and option values are rejected during intake,
/// never silently recorded.
#[derive(Debug, Clone)]
pub struct Questionnaire {
    questions: Vec<QuestionSpec>,
}

impl Questionnaire {
    pub fn standard() -> Self {
        Self {
            questions: vec![
                QuestionSpec {
                    key: "experience_level",
                    options: &["none", "hobbyist", "professional"],
                },
                QuestionSpec {
                    key: "current_occupation",
                    options: &["student", "employed", "self-employed", "unemployed", "retired"],
                },
                QuestionSpec {
                    key: "weekly_availability",
                    options: &["under-5h", "5-10h", "over-10h"],
                },
                QuestionSpec {
                    key: "motivation",
                    options: &["career-change", "side-income", "full-time-activity", "curiosity"],
                },
                QuestionSpec {
                    key: "vehicle_access",
                    options: &["own-vehicle", "shared-vehicle", "none"],
                },
                QuestionSpec {
                    key: "mobility_range",
                    options: &["local-only", "regional", "nationwide"],
                },
                QuestionSpec {
                    key: "start_horizon",
                    options: &["immediately", "within-3-months", "later"],
                },
                QuestionSpec {
                    key: "education_level",
                    options: &["none", "secondary", "higher"],
                },
                QuestionSpec {
                    key: "digital_comfort",
                    options: &["beginner", "intermediate", "advanced"],
                },
                QuestionSpec {
                    key: "referral_source",
                    options: &["search", "social-media", "word-of-mouth", "advertising", "other"],
                },
            ],
        }
    }

    pub fn questions(&self) -> &[QuestionSpec] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Guard turning raw submissions into audited candidates.
///
/// Structural completeness is checked first and every defect is surfaced at
/// once; the single hard gate afterwards is the driving-license attestation.
/// There is no weighted scoring.
#[derive(Debug, Clone)]
pub struct IntakeGuard {
    questionnaire: Questionnaire,
}

impl Default for IntakeGuard {
    fn default() -> Self {
        Self::new(Questionnaire::standard())
    }
}

impl IntakeGuard {
    pub fn new(questionnaire: Questionnaire) -> Self {
        Self { questionnaire }
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    /// Compute the verdict for a submission without persisting anything.
    pub fn screen(&self, submission: &CandidateSubmission) -> EligibilityVerdict {
        let mut reasons = Vec::new();

        if submission.contact.full_name.trim().is_empty() {
            reasons.push(ReasonCode::MissingFullName);
        }
        if submission.contact.email.trim().is_empty() {
            reasons.push(ReasonCode::MissingEmail);
        }

        let digits = submission
            .contact
            .phone
            .chars()
            .filter(char::is_ascii_digit)
            .count();
        if digits < MIN_PHONE_DIGITS {
            reasons.push(ReasonCode::InvalidPhone);
        }

        let required = self.questionnaire.len();
        let answered = submission
            .answers
            .keys()
            .filter(|key| {
                self.questionnaire
                    .questions()
                    .iter()
                    .any(|question| question.key == key.as_str())
            })
            .count();
        if answered < required {
            reasons.push(ReasonCode::IncompleteQuestionnaire { answered, required });
        }

        for question in self.questionnaire.questions() {
            match submission.answers.get(question.key) {
                None => reasons.push(ReasonCode::MissingAnswer {
                    question: question.key.to_string(),
                }),
                Some(value) if !question.options.contains(&value.as_str()) => {
                    reasons.push(ReasonCode::UnknownAnswer {
                        question: question.key.to_string(),
                        value: value.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for key in submission.answers.keys() {
            let known = self
                .questionnaire
                .questions()
                .iter()
                .any(|question| question.key == key.as_str());
            if !known {
                reasons.push(ReasonCode::UnknownQuestion { key: key.clone() });
            }
        }

        let project_length = submission.professional_project.trim().chars().count();
        if project_length < MIN_PROJECT_CHARS {
            reasons.push(ReasonCode::ProjectTooShort {
                length: project_length,
                minimum: MIN_PROJECT_CHARS,
            });
        }

        if !submission.license_attested {
            reasons.push(ReasonCode::LicenseNotAttested);
        }

        EligibilityVerdict::from_reasons(reasons)
    }

    /// Build the candidate record to persist, verdict included.
    ///
    /// Rejected submissions still produce a candidate; they are retained for
    /// audit and only blocked later at account provisioning.
    pub fn candidate_from_submission(&self, submission: CandidateSubmission) -> Candidate {
        let verdict = self.screen(&submission);
        Candidate {
            id: CandidateId::new(),
            contact: submission.contact,
            answers: submission.answers,
            professional_project: submission.professional_project,
            license_attested: submission.license_attested,
            disability: submission.disability,
            device: submission.device,
            verdict,
            submitted_at: Utc::now(),
        }
    }
}
