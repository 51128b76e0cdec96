//! Participant list validation.
//!
//! Every problem is collected so the caller can fix the whole list in one go.

use crate::error::{CertificateError, Result, ValidationIssue};
use crate::model::Participant;
use std::collections::HashMap;

/// Check a participant list before any certificate is composed.
///
/// Rows are reported 1-based in input order.
pub fn validate_participants(participants: &[Participant]) -> Result<()> {
    let issues = collect_issues(participants);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(CertificateError::Validation { issues })
    }
}

/// Same checks as [`validate_participants`], returning the issues directly.
pub fn collect_issues(participants: &[Participant]) -> Vec<ValidationIssue> {
    if participants.is_empty() {
        return vec![ValidationIssue::general("participant list is empty")];
    }

    let mut issues = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (index, participant) in participants.iter().enumerate() {
        let row = index + 1;
        let id = participant.id.trim();

        if id.is_empty() {
            issues.push(ValidationIssue::row(row, "", "id is empty"));
        } else if let Some(first) = first_seen.get(id) {
            issues.push(ValidationIssue::row(
                row,
                id,
                format!("duplicate id '{}' (first used on row {})", id, first),
            ));
        } else {
            first_seen.insert(id, row);
        }

        if participant.name.trim().is_empty() {
            issues.push(ValidationIssue::row(row, id, "name is empty"));
        }

        if let Some(email) = participant.email.as_deref() {
            if !email.trim().is_empty() && !is_plausible_email(email.trim()) {
                issues.push(ValidationIssue::row(
                    row,
                    id,
                    format!("email '{}' is not a valid address", email.trim()),
                ));
            }
        }
    }

    issues
}

/// Loose shape check: one `@`, a non-empty local part, and a dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.split_once('.') {
        Some((head, _)) => {
            !head.is_empty() && !domain.ends_with('.') && !domain.contains("..")
        }
        None => false,
    }
}
