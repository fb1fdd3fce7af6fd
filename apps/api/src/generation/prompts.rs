// All LLM prompt templates for the generation pipeline.
// Rendering is pure: the same inputs always give byte-identical prompts.

/// Profile extraction prompt. Replace `{cv_text}` before sending.
pub const PROFILE_EXTRACTION_TEMPLATE: &str = r#"You are an expert CV analyst. Extract the information in the CV below into structured JSON, accurately and completely.

IMPORTANT: Return ONLY valid JSON. No explanations, no prose, no markdown code fences.

Return a JSON object with this EXACT schema:
{
  "personal_info": {
    "name": "Full name",
    "email": "Email address",
    "phone": "Phone number",
    "location": "City, State/Country",
    "linkedin": "LinkedIn URL if present",
    "website": "Personal website if present"
  },
  "professional_summary": "2-3 sentences on the candidate's core strengths and experience",
  "key_skills": {
    "technical": ["technical skill"],
    "soft_skills": ["communication", "leadership"],
    "tools_and_technologies": ["tool", "framework"]
  },
  "work_experience": [
    {
      "position": "Job title",
      "company": "Company name",
      "location": "City, State",
      "duration": "Start date - End date",
      "key_achievements": ["Achievement, with metrics where the CV gives them"],
      "responsibilities": "Summary of main responsibilities"
    }
  ],
  "education": [
    {
      "degree": "Degree and field",
      "institution": "Institution name",
      "location": "City, State",
      "graduation_year": "Year",
      "gpa": "GPA if stated",
      "relevant_coursework": ["course"],
      "honors": "Honors or awards"
    }
  ],
  "certifications": [
    {
      "name": "Certification name",
      "issuer": "Issuing organization",
      "year": "Year obtained",
      "expiry": "Expiry date if any"
    }
  ],
  "languages": [
    {
      "language": "Language",
      "proficiency": "Native/Fluent/Conversational/Basic"
    }
  ],
  "projects": [
    {
      "name": "Project name",
      "description": "Short description",
      "technologies": ["technology"],
      "duration": "Project duration"
    }
  ]
}

RULES:
1. A missing string field is null, a missing array is [], a missing object is {}
2. Extract EVERY skill mentioned and put it in the right category
3. Keep quantified achievements exactly as written
4. Copy dates precisely; do not guess missing ones
5. Never invent information that is not in the CV

CV CONTENT:
{cv_text}"#;

/// Cover letter prompt. Replace `{candidate_profile}` and `{job_description}`.
pub const COVER_LETTER_TEMPLATE: &str = r#"You are an expert career counselor and professional writer. Write a personalized, professional cover letter that earns the hiring manager's attention.

CANDIDATE PROFILE (JSON):
{candidate_profile}

JOB DESCRIPTION:
{job_description}

STRUCTURE:
1. Header: the candidate's contact details and a professional salutation
2. Hook: an opening paragraph naming the specific role and company
3. Relevant experience: the candidate's strongest experience and achievements mapped to the job's requirements
4. Fit: the specific value and cultural fit the candidate brings
5. Closing: a call to action and a professional sign-off

CONTENT RULES:
- Use the candidate's real name and contact details from the profile
- Reference concrete requirements from the job description
- Quantify achievements using metrics from the profile
- Show knowledge of the company and role drawn from the job description
- Prefer active voice and strong verbs
- Do NOT use generic openers such as "I am writing to apply" or "Please find my resume attached"
- Every sentence must show fit; cut anything that does not
- Tone: professional and personable, confident without arrogance

PERSONALIZATION:
- Match the candidate's technical skills to the job's requirements
- Highlight experience that relates directly to the role
- Mention years of experience and career progression
- Include certifications or education only where the job asks for them

FORMAT:
- Standard business letter layout, contact details at the top
- Salutation to "Hiring Manager" when no name is given
- Single-spaced paragraphs separated by blank lines
- Close with "Best regards" or "Sincerely"

Write ONLY the cover letter. No explanations, notes, or formatting instructions."#;

/// Application email prompt. Replace `{candidate_profile}` and `{job_description}`.
pub const EMAIL_TEMPLATE: &str = r#"You are an expert recruiter and career coach. Write an application email that makes the hiring manager want to meet the candidate.

CANDIDATE PROFILE (JSON):
{candidate_profile}

JOB DESCRIPTION:
{job_description}

SUBJECT LINE:
- Specific and compelling, and includes the role title
- Signals strong fit at a glance
- Example shapes: "Experienced [Role] | [Key Skill/Achievement]" or "[Years] Years [Relevant Experience] - [Role Title] Application"

EMAIL STRUCTURE:
1. Greeting: a professional salutation
2. Opening: a hook that shows relevance and value immediately
3. Qualifications: the 2-3 most compelling qualifications for this job
4. Value proposition: the specific value the candidate brings to the organization
5. Call to action: ask for an interview or next step
6. Closing: a professional sign-off with contact details

CONTENT RULES:
- The body stays UNDER 200 words
- Lead with the strongest, most relevant qualification
- Quantify achievements using metrics from the profile
- Reference specific requirements from the job posting
- Do not repeat the whole CV; pick the best parts
- Confident, professional tone; every sentence earns its place

PERSONALIZATION:
- Take the company name and role title from the job description
- Match the candidate's seniority to the position
- Highlight the most relevant technical skills and achievements

FORMAT:
Subject: [subject line]

Dear [Hiring Manager/Team],

[Email body]

Best regards,
[Candidate Name]
[Phone Number]
[Email Address]

Write ONLY the email, starting with the subject line. No explanations or notes."#;

/// The three prompts the pipeline sends, with the fields each one needs.
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    ProfileExtraction {
        cv_text: &'a str,
    },
    CoverLetter {
        candidate_profile: &'a str,
        job_description: &'a str,
    },
    Email {
        candidate_profile: &'a str,
        job_description: &'a str,
    },
}

impl Prompt<'_> {
    pub fn render(&self) -> String {
        match *self {
            Prompt::ProfileExtraction { cv_text } => {
                fill(PROFILE_EXTRACTION_TEMPLATE, &[("cv_text", cv_text)])
            }
            Prompt::CoverLetter {
                candidate_profile,
                job_description,
            } => fill(
                COVER_LETTER_TEMPLATE,
                &[
                    ("candidate_profile", candidate_profile),
                    ("job_description", job_description),
                ],
            ),
            Prompt::Email {
                candidate_profile,
                job_description,
            } => fill(
                EMAIL_TEMPLATE,
                &[
                    ("candidate_profile", candidate_profile),
                    ("job_description", job_description),
                ],
            ),
        }
    }
}

/// Substitutes `{name}` placeholders in a single left-to-right pass.
/// Braces inside substituted values are copied as-is, never expanded.
/// Unknown `{...}` sequences (the JSON schema) are left untouched.
fn fill(template: &str, fields: &[(&str, &str)]) -> String {
    let extra: usize = fields.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let hit = fields.iter().find_map(|(name, value)| {
            after
                .strip_prefix(name)
                .and_then(|tail| tail.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });

        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
