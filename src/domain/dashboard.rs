use crate::db::poll::{InternalPoll, PollId};
use crate::db::user::UserId;
use crate::db::vote::PollVoteCount;
use std::collections::{HashMap, HashSet};

/// Which dashboard a user lands on first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DashboardView {
    Creator,
    Voter,
}

/// A poll row plus its total vote count, as the dashboard cards show it.
#[derive(Clone, Debug)]
pub struct PollOverview {
    pub poll: InternalPoll,
    pub vote_count: i64,
}

#[derive(Debug, Default)]
pub struct DashboardPartition {
    /// Polls the user created, newest first.
    pub created: Vec<PollOverview>,
    /// Polls by others the user has not voted on yet, newest first.
    pub open: Vec<PollOverview>,
}

/// Join polls with their aggregate counts; polls with no votes get 0.
pub fn with_vote_counts(polls: Vec<InternalPoll>, counts: &[PollVoteCount]) -> Vec<PollOverview> {
    let by_poll: HashMap<PollId, i64> = counts
        .iter()
        .map(|c| (c.poll_id, c.vote_count))
        .collect();
    polls
        .into_iter()
        .map(|poll| {
            let vote_count = by_poll.get(&poll.id).copied().unwrap_or(0);
            PollOverview { poll, vote_count }
        })
        .collect()
}

/// Split the full poll set into the two disjoint dashboard views. A poll
/// the user voted on belongs to neither list; input order (newest first)
/// is preserved. An empty voted set simply excludes nothing.
pub fn partition(
    polls: Vec<PollOverview>,
    user_id: UserId,
    voted: &HashSet<PollId>,
) -> DashboardPartition {
    let mut result = DashboardPartition::default();
    for overview in polls {
        if overview.poll.is_created_by(user_id) {
            result.created.push(overview);
        } else if !voted.contains(&overview.poll.id) {
            result.open.push(overview);
        }
    }
    result
}

/// First-visit routing: creators land on their own polls, everyone else
/// on the open ballots. Decided per fetch, never persisted.
pub fn landing(partition: &DashboardPartition) -> DashboardView {
    if partition.created.is_empty() {
        DashboardView::Voter
    } else {
        DashboardView::Creator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn poll(created_by: UserId, age_hours: i64) -> InternalPoll {
        InternalPoll {
            id: PollId::new(),
            title: "poll".to_owned(),
            description: "desc".to_owned(),
            created_by,
            created_at: Utc::now() - Duration::hours(age_hours),
            expiration_date: None,
        }
    }

    fn overviews(polls: Vec<InternalPoll>) -> Vec<PollOverview> {
        with_vote_counts(polls, &[])
    }

    #[test]
    fn own_and_voted_polls_never_show_as_open() {
        let me = UserId::new();
        let other = UserId::new();
        let mine = poll(me, 1);
        let voted_on = poll(other, 2);
        let fresh = poll(other, 3);
        let voted: HashSet<PollId> = [voted_on.id].iter().copied().collect();

        let split = partition(overviews(vec![mine.clone(), voted_on, fresh.clone()]), me, &voted);

        assert_eq!(split.created.len(), 1);
        assert_eq!(split.created[0].poll.id, mine.id);
        assert_eq!(split.open.len(), 1);
        assert_eq!(split.open[0].poll.id, fresh.id);
    }

    #[test]
    fn views_are_disjoint() {
        let me = UserId::new();
        let other = UserId::new();
        let polls = overviews(vec![poll(me, 1), poll(other, 2), poll(me, 3), poll(other, 4)]);
        let split = partition(polls, me, &HashSet::new());

        let created: HashSet<PollId> = split.created.iter().map(|o| o.poll.id).collect();
        let open: HashSet<PollId> = split.open.iter().map(|o| o.poll.id).collect();
        assert!(created.is_disjoint(&open));
        assert_eq!(created.len() + open.len(), 4);
    }

    #[test]
    fn empty_voted_set_keeps_all_foreign_polls_open() {
        let me = UserId::new();
        let other = UserId::new();
        let polls = overviews(vec![poll(other, 1), poll(other, 2)]);
        let split = partition(polls, me, &HashSet::new());
        assert_eq!(split.open.len(), 2);
        assert!(split.created.is_empty());
    }

    #[test]
    fn input_order_is_preserved() {
        let me = UserId::new();
        let other = UserId::new();
        let newest = poll(other, 1);
        let older = poll(other, 5);
        let split = partition(overviews(vec![newest.clone(), older.clone()]), me, &HashSet::new());
        assert_eq!(split.open[0].poll.id, newest.id);
        assert_eq!(split.open[1].poll.id, older.id);
    }

    #[test]
    fn landing_follows_created_polls() {
        let me = UserId::new();
        let other = UserId::new();

        let none_created = partition(overviews(vec![poll(other, 1)]), me, &HashSet::new());
        assert_eq!(landing(&none_created), DashboardView::Voter);

        let one_created = partition(overviews(vec![poll(me, 1)]), me, &HashSet::new());
        assert_eq!(landing(&one_created), DashboardView::Creator);
    }

    #[test]
    fn vote_counts_default_to_zero() {
        let me = UserId::new();
        let a = poll(me, 1);
        let b = poll(me, 2);
        let counts = vec![PollVoteCount {
            poll_id: b.id,
            vote_count: 3,
        }];
        let overviews = with_vote_counts(vec![a, b.clone()], &counts);
        assert_eq!(overviews[0].vote_count, 0);
        assert_eq!(overviews[1].vote_count, 3);
        assert_eq!(overviews[1].poll.id, b.id);
    }
}
