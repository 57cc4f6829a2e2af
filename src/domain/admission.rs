use crate::db::option::{InternalOption, OptionId};
use crate::db::poll::InternalPoll;
use crate::error::ApiError;
use chrono::{DateTime, Utc};

/// Gate a vote attempt before it reaches the store. Checked in order:
/// a selection must be present, the poll must not be expired, and the
/// selected option must belong to the poll. The one-vote-per-user rule is
/// not checked here: the store's unique index is the authority and a
/// violation comes back as `DuplicateVote`.
pub fn admit(
    poll: &InternalPoll,
    options: &[InternalOption],
    selection: Option<OptionId>,
    now: DateTime<Utc>,
) -> Result<OptionId, ApiError> {
    let option_id = selection.ok_or_else(|| ApiError::validation("Please select an option"))?;

    if poll.is_expired(now) {
        return Err(ApiError::PollExpired);
    }

    if !options.iter().any(|option| option.id == option_id) {
        return Err(ApiError::validation(
            "Selected option does not belong to this poll",
        ));
    }

    Ok(option_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::poll::PollId;
    use crate::db::user::UserId;
    use chrono::Duration;

    fn poll(expiration_date: Option<DateTime<Utc>>) -> InternalPoll {
        InternalPoll {
            id: PollId::new(),
            title: "favorite color?".to_owned(),
            description: "pick one".to_owned(),
            created_by: UserId::new(),
            created_at: Utc::now(),
            expiration_date,
        }
    }

    fn options_for(poll: &InternalPoll) -> Vec<InternalOption> {
        vec![
            InternalOption {
                id: OptionId::new(),
                poll_id: poll.id,
                option_text: "Red".to_owned(),
                position: 0,
            },
            InternalOption {
                id: OptionId::new(),
                poll_id: poll.id,
                option_text: "Blue".to_owned(),
                position: 1,
            },
        ]
    }

    #[test]
    fn missing_selection_is_rejected() {
        let poll = poll(None);
        let options = options_for(&poll);
        let err = admit(&poll, &options, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn expired_poll_rejects_even_a_valid_selection() {
        let now = Utc::now();
        let poll = poll(Some(now - Duration::days(1)));
        let options = options_for(&poll);
        let err = admit(&poll, &options, Some(options[0].id), now).unwrap_err();
        assert!(matches!(err, ApiError::PollExpired));
    }

    #[test]
    fn poll_without_expiration_never_expires() {
        let poll = poll(None);
        let options = options_for(&poll);
        let far_future = Utc::now() + Duration::days(10_000);
        assert!(admit(&poll, &options, Some(options[1].id), far_future).is_ok());
    }

    #[test]
    fn future_expiration_still_admits() {
        let now = Utc::now();
        let poll = poll(Some(now + Duration::hours(1)));
        let options = options_for(&poll);
        assert_eq!(
            admit(&poll, &options, Some(options[0].id), now).unwrap(),
            options[0].id
        );
    }

    #[test]
    fn foreign_option_is_rejected() {
        let poll = poll(None);
        let options = options_for(&poll);
        let err = admit(&poll, &options, Some(OptionId::new()), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
