// src/posting/prompts.rs

pub const EXTRACTION_SYSTEM: &str = "You are an assistant that extracts specific information from \
job postings. You reply with a single valid JSON object and nothing else.";

pub const FORMATTING_SYSTEM: &str = "You format job descriptions with Markdown for readability. \
You output only the formatted Markdown, without commentary before or after it.";

pub fn extraction_prompt(source_url: &str, posting_text: &str) -> String {
    format!(
        r#"Analyze the following job posting text obtained from the URL "{source_url}".
Extract the information requested below and provide it ONLY as a single valid JSON object with exactly these keys:
- "company": the name of the hiring company.
- "role": the specific job title or role.
- "location": the primary location(s) mentioned (e.g. "Chicago, IL", "Remote", "London, UK").
- "compensation": the salary or compensation range if explicitly mentioned (e.g. "$100,000 - $120,000", "£50k").
- "requisition_id": the requisition or job ID if explicitly mentioned.
- "application_url": the link to apply if it differs from the posting URL.
- "description": the main body of the job description, duties and qualifications, reformatted as Markdown. Use ## or ### headings for sections such as Responsibilities, Qualifications or About Us, **bold** for emphasis and bullet points for lists. Separate paragraphs with blank lines (\n\n).

If a piece of information is not present, use an empty string "" for its value. Do not add introductory text, explanations or code fences around the JSON object.

Job Posting Text:
---
{posting_text}
---

JSON Output:"#
    )
}

pub fn formatting_prompt(description: &str) -> String {
    format!(
        r#"Reformat the following job description using Markdown to improve its structure and readability. Use headings (## or ###) for sections like Responsibilities, Qualifications and About Us, **bold** for key terms or subheadings, and bullet points for lists. Separate paragraphs with blank lines. Output ONLY the formatted Markdown text.

Original Description:
---
{description}
---

Formatted Markdown Description:"#
    )
}
