//! Generation pipeline — the per-request state machine.
//!
//! Flow: validate → extract → profile completion → cover letter completion →
//!       email completion → response.
//!
//! Every transition is one call to [`PipelineState::step`]. A failing step
//! returns a [`StageFailure`] tagged with the stage that failed; nothing from
//! earlier stages is ever returned on failure.

use std::fmt;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extraction::{ExtractError, ExtractedText, RawDocument};
use crate::generation::prompts::Prompt;
use crate::llm_client::{strip_json_fences, LlmError, TextCompletionProvider};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Inputs of one generate request, exactly as uploaded.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub document: RawDocument,
    pub job_description: String,
}

/// CV text and job description, both known to be non-empty.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub cv_text: ExtractedText,
    pub job_description: String,
}

/// Candidate profile as returned by the first completion. Opaque: only
/// code fences are stripped, the JSON itself is passed on untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProfile(String);

impl CandidateProfile {
    pub fn from_completion(raw: &str) -> Self {
        let profile = strip_json_fences(raw);
        if serde_json::from_str::<serde_json::Value>(profile).is_err() {
            warn!(
                "Candidate profile is not valid JSON ({} bytes); passing it on as text",
                profile.len()
            );
        }
        Self(profile.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub cover_letter: String,
    pub email: String,
}

/// Result of a successful run. The profile rides along for diagnostics only.
#[derive(Debug, Clone)]
pub struct GeneratedDocuments {
    pub response: GenerationResponse,
    pub profile: CandidateProfile,
}

// ────────────────────────────────────────────────────────────────────────────
// Stages and failures
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Extract,
    Profile,
    CoverLetter,
    Email,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Profile => "profile",
            Stage::CoverLetter => "cover_letter",
            Stage::Email => "email",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("{0} is required")]
    EmptyInput(&'static str),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Completion(#[from] LlmError),
}

/// Terminal failure of the pipeline.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub cause: FailureCause,
}

impl StageFailure {
    fn new(stage: Stage, cause: impl Into<FailureCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// True when the caller sent something unusable (missing input or an
    /// unsupported file type). Read failures and completion errors are ours.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.cause,
            FailureCause::EmptyInput(_)
                | FailureCause::Extract(ExtractError::UnsupportedFormat(_))
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum PipelineState {
    Start(GenerationInput),
    Validated(GenerationInput),
    Extracted(GenerationRequest),
    Profiled {
        job_description: String,
        profile: CandidateProfile,
    },
    CoverLetterWritten {
        job_description: String,
        profile: CandidateProfile,
        cover_letter: String,
    },
    Succeeded(GeneratedDocuments),
}

impl PipelineState {
    /// The stage the next `step` call runs, or `None` once finished.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Start(_) => Some(Stage::Validate),
            PipelineState::Validated(_) => Some(Stage::Extract),
            PipelineState::Extracted(_) => Some(Stage::Profile),
            PipelineState::Profiled { .. } => Some(Stage::CoverLetter),
            PipelineState::CoverLetterWritten { .. } => Some(Stage::Email),
            PipelineState::Succeeded(_) => None,
        }
    }

    /// Runs exactly one transition.
    pub async fn step(
        self,
        provider: &dyn TextCompletionProvider,
    ) -> Result<PipelineState, StageFailure> {
        match self {
            PipelineState::Start(input) => {
                if input.job_description.trim().is_empty() {
                    return Err(StageFailure::new(
                        Stage::Validate,
                        FailureCause::EmptyInput("job description"),
                    ));
                }
                if input.document.bytes.is_empty() {
                    return Err(StageFailure::new(
                        Stage::Validate,
                        FailureCause::EmptyInput("CV"),
                    ));
                }
                Ok(PipelineState::Validated(input))
            }

            PipelineState::Validated(input) => {
                let cv_text = input.document.extract().map_err(|e| match e {
                    ExtractError::Empty => {
                        StageFailure::new(Stage::Extract, FailureCause::EmptyInput("CV text"))
                    }
                    other => StageFailure::new(Stage::Extract, other),
                })?;
                info!(
                    "Extracted {} bytes from {:?}",
                    cv_text.as_str().len(),
                    input.document.filename
                );
                Ok(PipelineState::Extracted(GenerationRequest {
                    cv_text,
                    job_description: input.job_description,
                }))
            }

            PipelineState::Extracted(request) => {
                let prompt = Prompt::ProfileExtraction {
                    cv_text: request.cv_text.as_str(),
                }
                .render();
                let raw = complete(provider, Stage::Profile, &prompt).await?;
                Ok(PipelineState::Profiled {
                    job_description: request.job_description,
                    profile: CandidateProfile::from_completion(&raw),
                })
            }

            PipelineState::Profiled {
                job_description,
                profile,
            } => {
                let prompt = Prompt::CoverLetter {
                    candidate_profile: profile.as_str(),
                    job_description: &job_description,
                }
                .render();
                let cover_letter = complete(provider, Stage::CoverLetter, &prompt).await?;
                Ok(PipelineState::CoverLetterWritten {
                    job_description,
                    profile,
                    cover_letter,
                })
            }

            PipelineState::CoverLetterWritten {
                job_description,
                profile,
                cover_letter,
            } => {
                let prompt = Prompt::Email {
                    candidate_profile: profile.as_str(),
                    job_description: &job_description,
                }
                .render();
                let email = complete(provider, Stage::Email, &prompt).await?;
                Ok(PipelineState::Succeeded(GeneratedDocuments {
                    response: GenerationResponse {
                        cover_letter,
                        email,
                    },
                    profile,
                }))
            }

            done @ PipelineState::Succeeded(_) => Ok(done),
        }
    }
}

async fn complete(
    provider: &dyn TextCompletionProvider,
    stage: Stage,
    prompt: &str,
) -> Result<String, StageFailure> {
    let started = Instant::now();
    let text = provider
        .complete(prompt)
        .await
        .map_err(|e| StageFailure::new(stage, e))?;
    info!(
        "Stage {} completed in {}ms ({} bytes)",
        stage,
        started.elapsed().as_millis(),
        text.len()
    );
    Ok(text)
}

/// Runs the whole pipeline for one request.
pub async fn generate_documents(
    provider: &dyn TextCompletionProvider,
    input: GenerationInput,
) -> Result<GeneratedDocuments, StageFailure> {
    let mut state = PipelineState::Start(input);
    loop {
        state = match state {
            PipelineState::Succeeded(documents) => return Ok(documents),
            pending => {
                if let Some(stage) = pending.next_stage() {
                    debug!("Entering stage {stage}");
                }
                pending.step(provider).await?
            }
        };
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
