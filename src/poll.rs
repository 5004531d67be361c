// src/poll.rs
//! Poll operations: creation, listing with counts, lookup and voting.
//!
//! Counts are never stored. Every read fetches the vote rows and tallies
//! them per option id.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{CreatePollData, NewPoll, NewVote, OptionRow, Poll, PollOption, PollRow},
    store::PollStore,
};

pub const MIN_OPTIONS: usize = 2;

/// A creation request that passed validation, already trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPoll {
    pub question: String,
    pub options: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub fn validate(data: &CreatePollData) -> Result<ValidPoll, AppError> {
    let mut errors = Vec::new();

    let question = data.question.trim();
    if question.is_empty() {
        errors.push("Please enter a question".to_string());
    }

    let options: Vec<String> = data.options.iter().map(|o| o.trim().to_string()).collect();
    if options.len() < MIN_OPTIONS {
        errors.push(format!("At least {MIN_OPTIONS} options are required"));
    }
    if options.iter().any(String::is_empty) {
        errors.push("Option text is required".to_string());
    }

    let expires_at = match data.expires_at.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match parse_expiry(raw) {
            Some(at) => Some(at),
            None => {
                errors.push("Invalid expiry date".to_string());
                None
            }
        },
    };

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    Ok(ValidPoll {
        question: question.to_string(),
        options,
        expires_at,
    })
}

/// Accepts RFC 3339, or a zone-less `datetime-local` value read as UTC.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

pub async fn create_poll(
    store: &dyn PollStore,
    user: Option<&AuthUser>,
    data: CreatePollData,
) -> Result<Uuid, AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;
    let valid = validate(&data)?;

    let poll = store
        .insert_poll(NewPoll {
            question: valid.question,
            created_by: user.id,
            expires_at: valid.expires_at,
        })
        .await
        .map_err(|e| AppError::remote("Failed to create poll", e))?;

    if let Err(e) = store.insert_options(poll.id, &valid.options).await {
        // Not atomic with the insert above: a crash here leaves the poll behind.
        if let Err(cleanup) = store.delete_poll(poll.id).await {
            tracing::error!("Could not remove poll {} after option failure: {cleanup}", poll.id);
        }
        return Err(AppError::remote("Failed to create poll options", e));
    }

    tracing::info!(
        "Poll {} created by {} with {} options",
        poll.id,
        user.id,
        valid.options.len()
    );

    Ok(poll.id)
}

/// Active polls, newest first, with vote counts.
///
/// If the vote query fails the polls are still returned, with zero counts.
pub async fn get_polls(store: &dyn PollStore) -> Result<Vec<Poll>, AppError> {
    let polls = store
        .active_polls()
        .await
        .map_err(|e| AppError::remote("Failed to fetch polls", e))?;

    let poll_ids: Vec<Uuid> = polls.iter().map(|p| p.id).collect();
    let options = if poll_ids.is_empty() {
        Vec::new()
    } else {
        store
            .options_for_polls(&poll_ids)
            .await
            .map_err(|e| AppError::remote("Failed to fetch polls", e))?
    };

    let option_ids: Vec<Uuid> = options.iter().map(|o| o.id).collect();
    let counts = if option_ids.is_empty() {
        HashMap::new()
    } else {
        match store.votes_for_options(&option_ids).await {
            Ok(votes) => count_votes(votes),
            Err(e) => {
                tracing::error!("Error fetching votes for polls: {e}");
                HashMap::new()
            }
        }
    };

    let mut by_poll: HashMap<Uuid, Vec<OptionRow>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(option);
    }

    Ok(polls
        .into_iter()
        .map(|poll| {
            let options = by_poll.remove(&poll.id).unwrap_or_default();
            assemble(poll, options, &counts)
        })
        .collect())
}

/// One poll by id, active or not. A malformed id reads as not found.
pub async fn get_poll_by_id(store: &dyn PollStore, poll_id: &str) -> Result<Poll, AppError> {
    let poll_id = Uuid::parse_str(poll_id).map_err(|_| AppError::NotFound("Poll not found"))?;

    let poll = store
        .find_poll(poll_id)
        .await
        .map_err(|e| AppError::remote("Failed to fetch poll", e))?
        .ok_or(AppError::NotFound("Poll not found"))?;

    let options = store
        .options_for_polls(&[poll_id])
        .await
        .map_err(|e| AppError::remote("Failed to fetch poll", e))?;

    let votes = store
        .votes_for_poll(poll_id)
        .await
        .map_err(|e| AppError::remote("Failed to fetch vote data", e))?;

    Ok(assemble(poll, options, &count_votes(votes)))
}

/// Records `user`'s vote for `option_id`.
///
/// The duplicate check and the insert are two separate calls. Two
/// concurrent requests from the same user can both pass the check.
pub async fn vote_on_poll(
    store: &dyn PollStore,
    user: Option<&AuthUser>,
    poll_id: &str,
    option_id: Uuid,
) -> Result<(), AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;
    let poll_id = Uuid::parse_str(poll_id).map_err(|_| AppError::NotFound("Poll not found"))?;

    let poll = store
        .find_poll(poll_id)
        .await
        .map_err(|e| AppError::remote("Failed to cast vote", e))?
        .ok_or(AppError::NotFound("Poll not found"))?;

    if poll.is_closed(Utc::now()) {
        return Err(AppError::PollClosed);
    }

    let options = store
        .options_for_polls(&[poll_id])
        .await
        .map_err(|e| AppError::remote("Failed to cast vote", e))?;
    if !options.iter().any(|o| o.id == option_id) {
        return Err(AppError::InvalidOption);
    }

    let existing = store
        .find_vote(poll_id, user.id)
        .await
        .map_err(|e| AppError::remote("Failed to cast vote", e))?;
    if existing.is_some() {
        return Err(AppError::AlreadyVoted);
    }

    store
        .insert_vote(NewVote {
            poll_id,
            option_id,
            user_id: user.id,
        })
        .await
        .map_err(|e| AppError::remote("Failed to cast vote", e))?;

    tracing::info!("User {} voted on poll {poll_id}", user.id);
    Ok(())
}

/// Tallies vote rows, given as the option id each one references.
pub fn count_votes<I>(option_ids: I) -> HashMap<Uuid, u64>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut counts = HashMap::new();
    for id in option_ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

/// Share of `total`, rounded to the nearest whole percent.
pub fn percentage(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((votes as f64 / total as f64) * 100.0).round() as u32
}

fn assemble(poll: PollRow, options: Vec<OptionRow>, counts: &HashMap<Uuid, u64>) -> Poll {
    let votes: Vec<u64> = options
        .iter()
        .map(|o| counts.get(&o.id).copied().unwrap_or(0))
        .collect();
    let total: u64 = votes.iter().sum();

    let options = options
        .into_iter()
        .zip(votes)
        .map(|(option, votes)| PollOption {
            id: option.id,
            text: option.option_text,
            votes,
            percentage: percentage(votes, total),
        })
        .collect();

    Poll {
        id: poll.id,
        question: poll.question,
        options,
        created_by: poll.created_by,
        created_at: poll.created_at,
        expires_at: poll.expires_at,
        is_active: poll.is_active,
        total_votes: total,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::store::{memory::faults::Faults, MemoryStore};

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: Some("voter@example.com".into()),
            user_metadata: None,
        }
    }

    fn data(question: &str, options: &[&str]) -> CreatePollData {
        CreatePollData {
            question: question.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            expires_at: None,
        }
    }

    async fn seeded(store: &MemoryStore, author: &AuthUser, options: &[&str]) -> Poll {
        let id = create_poll(store, Some(author), data("Best editor?", options))
            .await
            .unwrap();
        get_poll_by_id(store, &id.to_string()).await.unwrap()
    }

    #[test]
    fn validation_collects_every_problem() {
        let Err(AppError::Validation(errors)) = validate(&data("  ", &["only"])) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors,
            vec![
                "Please enter a question".to_string(),
                "At least 2 options are required".to_string(),
            ]
        );
    }

    #[test]
    fn validation_trims_question_and_options() {
        let valid = validate(&data(" Tabs or spaces? ", &[" tabs", "spaces "])).unwrap();
        assert_eq!(valid.question, "Tabs or spaces?");
        assert_eq!(valid.options, vec!["tabs", "spaces"]);
        assert_eq!(valid.expires_at, None);
    }

    #[test]
    fn expiry_accepts_rfc3339_and_datetime_local() {
        let mut request = data("q", &["a", "b"]);

        request.expires_at = Some("2030-01-02T03:04:05+01:00".into());
        assert_eq!(
            validate(&request).unwrap().expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 2, 4, 5).unwrap())
        );

        request.expires_at = Some("2030-01-02T03:04".into());
        assert_eq!(
            validate(&request).unwrap().expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).unwrap())
        );

        request.expires_at = Some("".into());
        assert_eq!(validate(&request).unwrap().expires_at, None);

        request.expires_at = Some("next tuesday".into());
        assert!(matches!(validate(&request), Err(AppError::Validation(_))));
    }

    #[test]
    fn percentages_round_and_handle_zero_total() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(4, 4), 100);
    }

    #[test]
    fn count_votes_groups_by_option() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let counts = count_votes([a, b, a, a]);
        assert_eq!(counts[&a], 3);
        assert_eq!(counts[&b], 1);
    }

    #[tokio::test]
    async fn authenticated_creation_returns_poll_id() {
        let store = MemoryStore::new();
        let author = user();

        let id = create_poll(&store, Some(&author), data("Q", &["A", "B"]))
            .await
            .unwrap();

        let poll = get_poll_by_id(&store, &id.to_string()).await.unwrap();
        assert_eq!(poll.id, id);
        assert_eq!(poll.created_by, author.id);
        assert!(poll.is_active);
        let texts: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn empty_option_fails_without_insert() {
        let store = MemoryStore::new();

        let result = create_poll(&store, Some(&user()), data("Q", &["A", " "])).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.counts().await.polls, 0);
        assert_eq!(store.counts().await.options, 0);
    }

    #[tokio::test]
    async fn unauthenticated_creation_fails_without_insert() {
        let store = MemoryStore::new();

        let result = create_poll(&store, None, data("Q", &["A", "B"])).await;

        assert!(matches!(result, Err(AppError::Unauthenticated)));
        assert_eq!(store.counts().await.polls, 0);
    }

    #[tokio::test]
    async fn option_failure_removes_poll() {
        let store = MemoryStore::new();
        Faults::trip(&store.faults.insert_options);

        let result = create_poll(&store, Some(&user()), data("Q", &["A", "B"])).await;

        match result {
            Err(AppError::Remote { message, .. }) => {
                assert_eq!(message, "Failed to create poll options")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.counts().await.polls, 0);
    }

    #[tokio::test]
    async fn listed_counts_match_vote_rows() {
        let store = MemoryStore::new();
        let author = user();
        let poll = seeded(&store, &author, &["Vim", "Emacs", "Nano"]).await;
        let (vim, emacs) = (poll.options[0].id, poll.options[1].id);

        for option in [vim, vim, emacs] {
            vote_on_poll(&store, Some(&user()), &poll.id.to_string(), option)
                .await
                .unwrap();
        }

        let polls = get_polls(&store).await.unwrap();
        assert_eq!(polls.len(), 1);
        let listed = &polls[0];
        let votes: Vec<u64> = listed.options.iter().map(|o| o.votes).collect();
        let shares: Vec<u32> = listed.options.iter().map(|o| o.percentage).collect();
        assert_eq!(votes, vec![2, 1, 0]);
        assert_eq!(shares, vec![67, 33, 0]);
        assert_eq!(listed.total_votes, 3);

        let fetched = get_poll_by_id(&store, &poll.id.to_string()).await.unwrap();
        let fetched_votes: Vec<u64> = fetched.options.iter().map(|o| o.votes).collect();
        assert_eq!(fetched_votes, votes);
    }

    #[tokio::test]
    async fn listing_survives_vote_query_failure() {
        let store = MemoryStore::new();
        let poll = seeded(&store, &user(), &["A", "B"]).await;
        vote_on_poll(&store, Some(&user()), &poll.id.to_string(), poll.options[0].id)
            .await
            .unwrap();
        Faults::trip(&store.faults.votes_for_options);

        let polls = get_polls(&store).await.unwrap();

        assert!(polls[0].options.iter().all(|o| o.votes == 0));
        assert_eq!(polls[0].total_votes, 0);
    }

    #[tokio::test]
    async fn single_poll_fails_when_votes_unavailable() {
        let store = MemoryStore::new();
        let poll = seeded(&store, &user(), &["A", "B"]).await;
        Faults::trip(&store.faults.votes_for_poll);

        let result = get_poll_by_id(&store, &poll.id.to_string()).await;

        assert!(matches!(
            result,
            Err(AppError::Remote { message: "Failed to fetch vote data", .. })
        ));
    }

    #[tokio::test]
    async fn unknown_or_malformed_id_is_not_found() {
        let store = MemoryStore::new();

        for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            assert!(matches!(
                get_poll_by_id(&store, &id).await,
                Err(AppError::NotFound("Poll not found"))
            ));
        }
    }

    #[tokio::test]
    async fn second_vote_by_same_user_is_rejected() {
        let store = MemoryStore::new();
        let poll = seeded(&store, &user(), &["A", "B"]).await;
        let voter = user();
        let poll_id = poll.id.to_string();

        vote_on_poll(&store, Some(&voter), &poll_id, poll.options[0].id)
            .await
            .unwrap();
        let second = vote_on_poll(&store, Some(&voter), &poll_id, poll.options[1].id).await;

        assert!(matches!(second, Err(AppError::AlreadyVoted)));
        assert_eq!(store.counts().await.votes, 1);
    }

    #[tokio::test]
    async fn vote_requires_sign_in_and_matching_option() {
        let store = MemoryStore::new();
        let poll = seeded(&store, &user(), &["A", "B"]).await;
        let other = seeded(&store, &user(), &["C", "D"]).await;
        let poll_id = poll.id.to_string();

        assert!(matches!(
            vote_on_poll(&store, None, &poll_id, poll.options[0].id).await,
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            vote_on_poll(&store, Some(&user()), &poll_id, other.options[0].id).await,
            Err(AppError::InvalidOption)
        ));
        assert_eq!(store.counts().await.votes, 0);
    }

    #[tokio::test]
    async fn expired_poll_refuses_votes() {
        let store = MemoryStore::new();
        let mut request = data("Q", &["A", "B"]);
        request.expires_at = Some((Utc::now() - Duration::hours(1)).to_rfc3339());
        let id = create_poll(&store, Some(&user()), request).await.unwrap();
        let poll = get_poll_by_id(&store, &id.to_string()).await.unwrap();

        let result = vote_on_poll(&store, Some(&user()), &id.to_string(), poll.options[0].id).await;

        assert!(matches!(result, Err(AppError::PollClosed)));
    }
}
