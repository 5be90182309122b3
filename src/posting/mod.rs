// src/posting/mod.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod extractor;
pub mod prompts;

pub use extractor::StructuredExtractor;

/// Everything the note header records about one posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingFields {
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub compensation: Option<String>,
    pub requisition_id: Option<String>,
    pub application_url: Option<String>,
    pub source_url: String,
    pub applied: bool,
    pub interview: bool,
    pub rejected: bool,
    pub declined: bool,
    pub date_applied: Option<NaiveDate>,
    pub recruiter_screen: Option<NaiveDate>,
}

/// Application status recorded alongside the extracted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub applied: bool,
    pub interview: bool,
    pub rejected: bool,
    pub declined: bool,
    pub date_applied: Option<NaiveDate>,
    pub recruiter_screen: Option<NaiveDate>,
}

impl StatusFlags {
    /// The usual case: the posting is saved at the moment of applying.
    pub fn applied_on(date: NaiveDate) -> Self {
        Self {
            applied: true,
            interview: false,
            rejected: false,
            declined: false,
            date_applied: Some(date),
            recruiter_screen: None,
        }
    }

    pub fn not_applied() -> Self {
        Self {
            applied: false,
            interview: false,
            rejected: false,
            declined: false,
            date_applied: None,
            recruiter_screen: None,
        }
    }
}

/// Output of the structured extraction stage. `company` and `role` are
/// guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPosting {
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub compensation: Option<String>,
    pub requisition_id: Option<String>,
    pub application_url: Option<String>,
    pub description: String,
}

impl ExtractedPosting {
    /// Attach the run context and split off the formatted description.
    pub fn into_fields(self, source_url: &str, status: StatusFlags) -> (PostingFields, String) {
        let fields = PostingFields {
            company: self.company,
            role: self.role,
            location: self.location,
            compensation: self.compensation,
            requisition_id: self.requisition_id,
            application_url: self.application_url,
            source_url: source_url.to_string(),
            applied: status.applied,
            interview: status.interview,
            rejected: status.rejected,
            declined: status.declined,
            date_applied: status.date_applied,
            recruiter_screen: status.recruiter_screen,
        };
        (fields, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_fields_applies_status() {
        let extracted = ExtractedPosting {
            company: "Acme".into(),
            role: "Senior Developer".into(),
            location: Some("Remote".into()),
            compensation: None,
            requisition_id: Some("R-42".into()),
            application_url: None,
            description: "We are hiring...".into(),
        };
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let (fields, description) =
            extracted.into_fields("https://jobs.example/42", StatusFlags::applied_on(date));

        assert_eq!(fields.company, "Acme");
        assert_eq!(fields.source_url, "https://jobs.example/42");
        assert!(fields.applied);
        assert!(!fields.interview && !fields.rejected && !fields.declined);
        assert_eq!(fields.recruiter_screen, None);
        assert_eq!(fields.date_applied, Some(date));
        assert_eq!(description, "We are hiring...");
    }

    #[test]
    fn test_not_applied_has_no_date() {
        let status = StatusFlags::not_applied();
        assert!(!status.applied);
        assert_eq!(status.date_applied, None);
    }
}
