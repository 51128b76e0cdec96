//! CSV roster ingestion.
//!
//! The header row decides the columns, case-insensitively: `name` or
//! `full_name`, `id` or `user_id`, and an optional `email`. Bad rows are
//! reported and skipped rather than aborting the whole import.

use crate::error::{CertificateError, Result, ValidationIssue};
use crate::model::Participant;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

/// Participants read from a roster plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct RosterParse {
    pub participants: Vec<Participant>,
    pub issues: Vec<ValidationIssue>,
}

impl RosterParse {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

struct Columns {
    id: usize,
    name: usize,
    email: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
        };
        let name = find(&["name", "full_name"]);
        let id = find(&["id", "user_id"]);
        match (id, name) {
            (Some(id), Some(name)) => Ok(Self {
                id,
                name,
                email: find(&["email"]),
            }),
            (None, _) => Err(CertificateError::Roster(
                "missing required column 'id' (or 'user_id')".to_string(),
            )),
            (_, None) => Err(CertificateError::Roster(
                "missing required column 'name' (or 'full_name')".to_string(),
            )),
        }
    }
}

/// Parse CSV text into participants.
///
/// Issue rows are 1-based data rows (the header is not counted).
pub fn parse_roster(csv_text: &str) -> Result<RosterParse> {
    let text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = Columns::from_headers(reader.headers()?)?;
    let mut parsed = RosterParse::default();

    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable roster row {}: {}", row, e);
                parsed
                    .issues
                    .push(ValidationIssue::row(row, "", format!("unreadable row: {}", e)));
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }

        let id = record.get(columns.id).unwrap_or_default();
        let name = record.get(columns.name).unwrap_or_default();
        if id.is_empty() || name.is_empty() {
            let missing = if id.is_empty() { "id" } else { "name" };
            parsed
                .issues
                .push(ValidationIssue::row(row, id, format!("{} is empty", missing)));
            continue;
        }

        let mut participant = Participant::new(id, name);
        if let Some(email) = columns
            .email
            .and_then(|i| record.get(i))
            .filter(|e| !e.is_empty())
        {
            participant = participant.with_email(email);
        }
        parsed.participants.push(participant);
    }

    debug!(
        "Roster parsed: {} participant(s), {} issue(s)",
        parsed.participants.len(),
        parsed.issues.len()
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_roster() {
        let csv = "id,name,email\nu1,John Doe,john@example.com\nu2,Ana Lima,\n";
        let parsed = parse_roster(csv).unwrap();
        assert!(parsed.is_clean());
        assert_eq!(parsed.participants.len(), 2);
        assert_eq!(
            parsed.participants[0],
            Participant::new("u1", "John Doe").with_email("john@example.com")
        );
        assert_eq!(parsed.participants[1].email, None);
    }

    #[test]
    fn test_header_aliases_and_case() {
        let csv = "Full_Name,USER_ID\n\"Doe, John\",42\n";
        let parsed = parse_roster(csv).unwrap();
        assert_eq!(parsed.participants, vec![Participant::new("42", "Doe, John")]);
    }

    #[test]
    fn test_missing_header_is_an_error() {
        match parse_roster("email,name\na@b.co,Ann\n") {
            Err(CertificateError::Roster(msg)) => assert!(msg.contains("id")),
            _ => panic!("Expected Roster"),
        }
        match parse_roster("id\n1\n") {
            Err(CertificateError::Roster(msg)) => assert!(msg.contains("name")),
            _ => panic!("Expected Roster"),
        }
    }

    #[test]
    fn test_bad_rows_are_reported_and_skipped() {
        let csv = "id,name\nu1,John\n,Nobody\nu3,\nu4,Grace\n";
        let parsed = parse_roster(csv).unwrap();
        assert_eq!(parsed.participants.len(), 2);
        assert_eq!(parsed.issues.len(), 2);
        assert_eq!(parsed.issues[0].row, Some(2));
        assert!(parsed.issues[0].message.contains("id"));
        assert_eq!(parsed.issues[1].row, Some(3));
        assert_eq!(parsed.issues[1].participant_id.as_deref(), Some("u3"));
    }

    #[test]
    fn test_short_rows_and_blank_lines() {
        let csv = "\u{feff}id,name,email\n  u1 ,  John  \n,,\nu2,Ana,ana@example.com\n";
        let parsed = parse_roster(csv).unwrap();
        assert!(parsed.is_clean());
        assert_eq!(parsed.participants[0], Participant::new("u1", "John"));
        assert_eq!(parsed.participants[1].id, "u2");
    }
}
