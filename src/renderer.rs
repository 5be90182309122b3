// src/renderer.rs
//! Fills the note template from extracted posting fields.

use crate::error::{PipelineError, Result};
use crate::posting::PostingFields;
use crate::utils::{collapse_whitespace, normalize_newlines};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

/// Header keys are read by an external dashboard; keep them stable.
pub const DEFAULT_TEMPLATE: &str = "---
company: {{company}}
tags:
  - jobpost
role: {{role}}
location: {{location}}
applied: {{applied}}
date_applied: {{date_applied}}
recruiter_screen: {{recruiter_screen}}
interview: {{interview}}
rejected: {{rejected}}
declined: {{declined}}
compensation: {{compensation}}
requisition_id: {{requisition_id}}
source_url: {{source_url}}
application_url: {{application_url}}
---

## Description

{{description}}
";

/// A rendered note. `stem` is the unsanitized file name, `"{company} - {role}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub stem: String,
    pub content: String,
}

pub struct NoteRenderer {
    template: String,
}

impl Default for NoteRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteRenderer {
    pub fn new() -> Self {
        Self::with_template(DEFAULT_TEMPLATE.to_string())
    }

    pub fn with_template(template: String) -> Self {
        Self {
            template: normalize_newlines(&template),
        }
    }

    /// Load a replacement template using the same `{{key}}` placeholders
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Environment(format!(
                "failed to read note template {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::with_template(template))
    }

    pub fn render(&self, fields: &PostingFields, description: &str) -> Note {
        let vars = Self::variables(fields, description);
        Note {
            stem: format!("{} - {}", fields.company.trim(), fields.role.trim()),
            content: Self::process_variables(&self.template, &vars),
        }
    }

    fn variables(fields: &PostingFields, description: &str) -> HashMap<&'static str, String> {
        let optional = |value: &Option<String>| yaml_value(value.as_deref().unwrap_or(""));

        let mut vars = HashMap::new();
        vars.insert("company", yaml_value(&fields.company));
        vars.insert("role", yaml_value(&fields.role));
        vars.insert("location", optional(&fields.location));
        vars.insert("compensation", optional(&fields.compensation));
        vars.insert("requisition_id", optional(&fields.requisition_id));
        vars.insert("application_url", optional(&fields.application_url));
        vars.insert("source_url", yaml_value(&fields.source_url));
        vars.insert("applied", fields.applied.to_string());
        vars.insert("interview", fields.interview.to_string());
        vars.insert("rejected", fields.rejected.to_string());
        vars.insert("declined", fields.declined.to_string());
        vars.insert(
            "date_applied",
            fields.date_applied.map(format_date).unwrap_or_default(),
        );
        // Read as a string by the dashboard, so unset is '' rather than null
        vars.insert(
            "recruiter_screen",
            fields
                .recruiter_screen
                .map(format_date)
                .unwrap_or_else(|| "''".to_string()),
        );
        vars.insert("description", normalize_newlines(description.trim()));
        vars
    }

    /// Replace `{{key}}` placeholders in one left-to-right pass. Substituted
    /// values are not scanned again and unknown keys are left untouched.
    pub fn process_variables(template: &str, vars: &HashMap<&str, String>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };

            match vars.get(after[..end].trim()) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + end + 4]),
            }
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        out
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Single-line header value, double-quoted only when YAML would misread it
fn yaml_value(raw: &str) -> String {
    let value = collapse_whitespace(raw);
    if value.is_empty() {
        return value;
    }
    if needs_quoting(&value) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value
    }
}

fn needs_quoting(value: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ];

    let lower = value.to_lowercase();
    value.starts_with(INDICATORS)
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || matches!(
            lower.as_str(),
            "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n" | "null" | "~"
        )
        || value.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> PostingFields {
        PostingFields {
            company: "Acme Corp".into(),
            role: "Backend Engineer".into(),
            location: Some("Chicago, IL".into()),
            compensation: None,
            requisition_id: None,
            application_url: None,
            source_url: "https://jobs.example/acme/123".into(),
            applied: true,
            interview: false,
            rejected: false,
            declined: false,
            date_applied: NaiveDate::from_ymd_opt(2024, 3, 9),
            recruiter_screen: None,
        }
    }

    #[test]
    fn test_header_contains_company_and_role_verbatim() {
        let note = NoteRenderer::new().render(&fields(), "Build things.");

        assert!(note.content.starts_with("---\n"));
        assert!(note.content.contains("\ncompany: Acme Corp\n"));
        assert!(note.content.contains("\nrole: Backend Engineer\n"));
        assert!(note.content.contains("\nlocation: Chicago, IL\n"));
        assert!(note.content.contains("\nsource_url: https://jobs.example/acme/123\n"));
        assert!(note.content.contains("\ndate_applied: 2024-03-09\n"));
        assert_eq!(note.stem, "Acme Corp - Backend Engineer");
    }

    #[test]
    fn test_unset_fields_render_empty_or_false() {
        let mut f = fields();
        f.applied = false;
        f.date_applied = None;
        let note = NoteRenderer::new().render(&f, "");

        assert!(note.content.contains("\ncompensation: \n"));
        assert!(note.content.contains("\nrequisition_id: \n"));
        assert!(note.content.contains("\napplication_url: \n"));
        assert!(note.content.contains("\ndate_applied: \n"));
        assert!(note.content.contains("\napplied: false\n"));
        assert!(note.content.contains("\ninterview: false\n"));
        assert!(note.content.contains("\nrejected: false\n"));
        assert!(note.content.contains("\ndeclined: false\n"));
        assert!(note.content.contains("\nrecruiter_screen: ''\n"));
    }

    #[test]
    fn test_recruiter_screen_date_and_declined() {
        let mut f = fields();
        f.recruiter_screen = NaiveDate::from_ymd_opt(2024, 3, 20);
        f.declined = true;
        let note = NoteRenderer::new().render(&f, "");

        assert!(note.content.contains("\nrecruiter_screen: 2024-03-20\n"));
        assert!(note.content.contains("\ndeclined: true\n"));
    }

    #[test]
    fn test_header_keys_in_fixed_order() {
        let note = NoteRenderer::new().render(&fields(), "x");
        let keys: Vec<&str> = note
            .content
            .lines()
            .skip(1)
            .take_while(|l| *l != "---")
            .filter(|l| !l.starts_with(' '))
            .filter_map(|l| l.split(':').next())
            .collect();

        assert_eq!(
            keys,
            vec![
                "company",
                "tags",
                "role",
                "location",
                "applied",
                "date_applied",
                "recruiter_screen",
                "interview",
                "rejected",
                "declined",
                "compensation",
                "requisition_id",
                "source_url",
                "application_url",
            ]
        );
    }

    #[test]
    fn test_body_follows_header() {
        let note = NoteRenderer::new().render(&fields(), "## About\r\n\r\nWe build.\r\n");
        assert!(note
            .content
            .ends_with("---\n\n## Description\n\n## About\n\nWe build.\n"));
    }

    #[test]
    fn test_ambiguous_values_are_quoted() {
        assert_eq!(yaml_value("Acme"), "Acme");
        assert_eq!(yaml_value("$100,000 - $120,000"), "$100,000 - $120,000");
        assert_eq!(yaml_value("Role: Lead"), "\"Role: Lead\"");
        assert_eq!(yaml_value("12345"), "\"12345\"");
        assert_eq!(yaml_value("true"), "\"true\"");
        assert_eq!(yaml_value("*Remote*"), "\"*Remote*\"");
        assert_eq!(yaml_value("Say \"hi\": now"), "\"Say \\\"hi\\\": now\"");
        assert_eq!(yaml_value("  multi\nline  "), "multi line");
    }

    #[test]
    fn test_process_variables_single_pass() {
        let mut vars = HashMap::new();
        vars.insert("a", "{{b}}".to_string());
        vars.insert("b", "B".to_string());

        assert_eq!(
            NoteRenderer::process_variables("x {{a}} {{ b }} {{missing}} {{open", &vars),
            "x {{b}} B {{missing}} {{open"
        );
    }

    #[test]
    fn test_custom_template() {
        let renderer = NoteRenderer::with_template("# {{role}} at {{company}}\r\n".into());
        let note = renderer.render(&fields(), "");
        assert_eq!(note.content, "# Backend Engineer at Acme Corp\n");
    }
}
