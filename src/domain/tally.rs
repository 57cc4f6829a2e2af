use crate::db::option::{InternalOption, OptionId};
use crate::db::vote::InternalVote;
use std::collections::HashMap;

/// Per-option result line: the option, its vote count and its share of
/// the poll total.
#[derive(Clone, Debug)]
pub struct OptionTally {
    pub option: InternalOption,
    pub vote_count: i64,
    pub percentage: f64,
}

/// Count votes per option and derive percentages, keeping the original
/// option order. Options nobody voted for default to 0 / 0.0%.
pub fn tally(options: &[InternalOption], votes: &[InternalVote]) -> Vec<OptionTally> {
    let mut counts: HashMap<OptionId, i64> = HashMap::new();
    for vote in votes {
        *counts.entry(vote.option_id).or_insert(0) += 1;
    }

    let total: i64 = options
        .iter()
        .map(|option| counts.get(&option.id).copied().unwrap_or(0))
        .sum();

    options
        .iter()
        .map(|option| {
            let vote_count = counts.get(&option.id).copied().unwrap_or(0);
            let percentage = if total > 0 {
                100.0 * vote_count as f64 / total as f64
            } else {
                0.0
            };
            OptionTally {
                option: option.clone(),
                vote_count,
                percentage,
            }
        })
        .collect()
}

pub fn total_votes(tallies: &[OptionTally]) -> i64 {
    tallies.iter().map(|t| t.vote_count).sum()
}

/// Results-view order: vote count descending, ties keeping the original
/// option order (the sort is stable).
pub fn ranked(tallies: &[OptionTally]) -> Vec<OptionTally> {
    let mut ranked = tallies.to_vec();
    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    ranked
}

/// The leading option of a ranked list, only meaningful once someone has
/// actually voted.
pub fn leading(ranked: &[OptionTally]) -> Option<&OptionTally> {
    ranked.first().filter(|t| t.vote_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::poll::PollId;
    use crate::db::user::UserId;
    use crate::db::vote::VoteId;

    fn option(poll_id: PollId, text: &str, position: i64) -> InternalOption {
        InternalOption {
            id: OptionId::new(),
            poll_id,
            option_text: text.to_owned(),
            position,
        }
    }

    fn vote(poll_id: PollId, option_id: OptionId) -> InternalVote {
        InternalVote {
            id: VoteId::new(),
            poll_id,
            option_id,
            user_id: UserId::new(),
        }
    }

    #[test]
    fn red_blue_three_to_one() {
        let poll_id = PollId::new();
        let options = vec![option(poll_id, "Red", 0), option(poll_id, "Blue", 1)];
        let votes = vec![
            vote(poll_id, options[0].id),
            vote(poll_id, options[0].id),
            vote(poll_id, options[0].id),
            vote(poll_id, options[1].id),
        ];

        let tallies = tally(&options, &votes);
        assert_eq!(tallies[0].vote_count, 3);
        assert_eq!(tallies[0].percentage, 75.0);
        assert_eq!(tallies[1].vote_count, 1);
        assert_eq!(tallies[1].percentage, 25.0);
        assert_eq!(total_votes(&tallies), 4);
    }

    #[test]
    fn fresh_poll_is_all_zeroes() {
        let poll_id = PollId::new();
        let options = vec![option(poll_id, "Yes", 0), option(poll_id, "No", 1)];

        let tallies = tally(&options, &[]);
        assert_eq!(total_votes(&tallies), 0);
        for t in &tallies {
            assert_eq!(t.vote_count, 0);
            assert_eq!(t.percentage, 0.0);
        }
    }

    #[test]
    fn counts_sum_to_total() {
        let poll_id = PollId::new();
        let options = vec![
            option(poll_id, "a", 0),
            option(poll_id, "b", 1),
            option(poll_id, "c", 2),
        ];
        let mut votes = vec![];
        for _ in 0..5 {
            votes.push(vote(poll_id, options[0].id));
        }
        for _ in 0..2 {
            votes.push(vote(poll_id, options[2].id));
        }

        let tallies = tally(&options, &votes);
        let sum: i64 = tallies.iter().map(|t| t.vote_count).sum();
        assert_eq!(sum, total_votes(&tallies));
        assert_eq!(sum, 7);
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let poll_id = PollId::new();
        let options = vec![
            option(poll_id, "first", 0),
            option(poll_id, "second", 1),
            option(poll_id, "third", 2),
        ];
        let votes = vec![
            vote(poll_id, options[1].id),
            vote(poll_id, options[1].id),
            // first and third tie at one vote each
            vote(poll_id, options[0].id),
            vote(poll_id, options[2].id),
        ];

        let ranked = ranked(&tally(&options, &votes));
        assert_eq!(ranked[0].option.option_text, "second");
        assert_eq!(ranked[1].option.option_text, "first");
        assert_eq!(ranked[2].option.option_text, "third");
        assert_eq!(leading(&ranked).unwrap().option.option_text, "second");
    }

    #[test]
    fn no_leading_option_without_votes() {
        let poll_id = PollId::new();
        let options = vec![option(poll_id, "a", 0), option(poll_id, "b", 1)];
        let ranked = ranked(&tally(&options, &[]));
        assert!(leading(&ranked).is_none());
    }
}
