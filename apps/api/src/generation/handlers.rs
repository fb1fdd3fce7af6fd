//! Axum route handlers for the Generation API.

use axum::{
    extract::{Multipart, State},
    response::Html,
};
use bytes::Bytes;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::RawDocument;
use crate::generation::pipeline::{generate_documents, GeneratedDocuments, GenerationInput};
use crate::state::AppState;

const CV_FIELD: &str = "cv";
const JOB_DESCRIPTION_FIELD: &str = "job-description";

const HOME_PAGE: &str = include_str!("../../ui/home.html");

/// GET /
pub async fn handle_home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

/// POST /generate
///
/// Multipart form: `cv` (file) and `job-description` (text).
/// Returns an HTML fragment for htmx to swap into the page.
pub async fn handle_generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let input = read_form(multipart).await?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("generate", %request_id, cv = %input.document.filename);

    let documents = async {
        info!(
            "Generating documents: cv_bytes={}, jd_bytes={}",
            input.document.bytes.len(),
            input.job_description.len()
        );
        let documents = generate_documents(state.completion.as_ref(), input).await?;
        info!("Generation succeeded");
        Ok::<_, AppError>(documents)
    }
    .instrument(span)
    .await?;

    Ok(Html(render_documents(&documents, state.expose_profile)))
}

async fn read_form(mut multipart: Multipart) -> Result<GenerationInput, AppError> {
    let mut cv: Option<(String, Bytes)> = None;
    let mut job_description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse form: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(CV_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read CV file: {e}")))?;
                cv = Some((filename, bytes));
            }
            Some(JOB_DESCRIPTION_FIELD) => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read job description: {e}"))
                })?;
                job_description = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        cv.ok_or_else(|| AppError::Validation("Failed to get CV file".to_string()))?;

    // An absent job description goes through the pipeline's own empty-input check.
    Ok(GenerationInput {
        document: RawDocument::new(filename, bytes),
        job_description: job_description.unwrap_or_default(),
    })
}

fn render_documents(documents: &GeneratedDocuments, expose_profile: bool) -> String {
    let mut html = format!(
        r#"<h2>Generated Documents</h2>
<article id="cover-letter-result">
  <h3>Cover Letter</h3>
  <textarea rows="15" style="width: 100%; font-family: monospace;">{}</textarea>
</article>
<article id="email-result">
  <h3>Application Email</h3>
  <textarea rows="10" style="width: 100%; font-family: monospace;">{}</textarea>
</article>
"#,
        escape_html(&documents.response.cover_letter),
        escape_html(&documents.response.email),
    );

    if expose_profile {
        html.push_str(&format!(
            r#"<details id="profile-result">
  <summary>Candidate Profile</summary>
  <pre>{}</pre>
</details>
"#,
            escape_html(documents.profile.as_str())
        ));
    }

    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
