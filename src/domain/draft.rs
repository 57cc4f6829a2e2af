use crate::error::ApiError;
use chrono::{DateTime, Utc};

/// A poll never has fewer than this many options.
pub const MIN_OPTIONS: usize = 2;

/// The create-poll form's option rows: an ordered, explicitly indexed
/// collection with value-semantic edits. Every operation returns a new
/// collection instead of splicing in place, so callers can never alias a
/// half-edited draft.
#[derive(Clone, Debug, PartialEq)]
pub struct DraftOptions {
    rows: Vec<String>,
}

impl DraftOptions {
    /// A fresh draft starts with the minimum two blank rows.
    pub fn new() -> Self {
        Self {
            rows: vec![String::new(); MIN_OPTIONS],
        }
    }

    /// A draft as submitted over the wire; may be under the minimum,
    /// which `PollDraft::validate` rejects.
    pub fn from_rows(rows: Vec<String>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn with_added(&self) -> Self {
        let mut rows = self.rows.clone();
        rows.push(String::new());
        Self { rows }
    }

    /// Remove the row at `index`. Refused (returns the draft unchanged)
    /// when it would drop below the minimum or the index is out of range.
    pub fn with_removed(&self, index: usize) -> Self {
        if self.rows.len() <= MIN_OPTIONS || index >= self.rows.len() {
            return self.clone();
        }
        let mut rows = self.rows.clone();
        rows.remove(index);
        Self { rows }
    }

    pub fn with_text(&self, index: usize, text: impl Into<String>) -> Self {
        let mut rows = self.rows.clone();
        if let Some(row) = rows.get_mut(index) {
            *row = text.into();
        }
        Self { rows }
    }
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Draft checked and trimmed, safe to hand to the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedPoll {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct PollDraft {
    pub title: String,
    pub description: String,
    pub options: DraftOptions,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl PollDraft {
    /// Submission validation, run before any store write: all fields and
    /// rows non-blank, at least two options, expiration not in the past.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<ValidatedPoll, ApiError> {
        let title = self.title.trim();
        let description = self.description.trim();

        if title.is_empty()
            || description.is_empty()
            || self.options.rows().iter().any(|row| row.trim().is_empty())
        {
            return Err(ApiError::validation("Please fill in all fields"));
        }

        if self.options.len() < MIN_OPTIONS {
            return Err(ApiError::validation("Please add at least 2 options"));
        }

        if let Some(expiration) = self.expiration_date {
            if expiration < now {
                return Err(ApiError::validation("Expiration date cannot be in the past"));
            }
        }

        Ok(ValidatedPoll {
            title: title.to_owned(),
            description: description.to_owned(),
            options: self
                .options
                .rows()
                .iter()
                .map(|row| row.trim().to_owned())
                .collect(),
            expiration_date: self.expiration_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(options: Vec<&str>) -> PollDraft {
        PollDraft {
            title: "Lunch spot".to_owned(),
            description: "Where to?".to_owned(),
            options: DraftOptions::from_rows(
                options.into_iter().map(str::to_owned).collect(),
            ),
            expiration_date: None,
        }
    }

    #[test]
    fn single_option_fails_before_any_write() {
        let err = draft(vec!["only one"]).validate(Utc::now()).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Please add at least 2 options"
        );
    }

    #[test]
    fn blank_rows_fail_validation() {
        let err = draft(vec!["pizza", "  "]).validate(Utc::now()).unwrap_err();
        assert_eq!(err.user_message(), "Please fill in all fields");

        let mut blank_title = draft(vec!["pizza", "sushi"]);
        blank_title.title = "   ".to_owned();
        assert!(blank_title.validate(Utc::now()).is_err());
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let valid = draft(vec![" pizza ", "sushi"]).validate(Utc::now()).unwrap();
        assert_eq!(valid.options, vec!["pizza", "sushi"]);
        assert_eq!(valid.title, "Lunch spot");
    }

    #[test]
    fn past_expiration_is_rejected() {
        let now = Utc::now();
        let mut expired = draft(vec!["a", "b"]);
        expired.expiration_date = Some(now - Duration::days(1));
        assert!(expired.validate(now).is_err());

        let mut future = draft(vec!["a", "b"]);
        future.expiration_date = Some(now + Duration::days(1));
        assert!(future.validate(now).is_ok());
    }

    #[test]
    fn row_edits_have_value_semantics() {
        let original = DraftOptions::new().with_text(0, "a").with_text(1, "b");
        let grown = original.with_added().with_text(2, "c");

        assert_eq!(original.len(), 2);
        assert_eq!(grown.len(), 3);
        assert_eq!(original.rows(), ["a", "b"]);
        assert_eq!(grown.rows(), ["a", "b", "c"]);
    }

    #[test]
    fn removal_never_drops_below_minimum() {
        let two = DraftOptions::new();
        assert_eq!(two.with_removed(0), two);

        let three = two.with_added();
        assert_eq!(three.with_removed(1).len(), 2);
        // out-of-range index is a no-op
        assert_eq!(three.with_removed(9), three);
    }
}
