//! Quiz-result ingestion from training spreadsheets.
//!
//! Another event producer: rows become `RecordQuizResult` commands applied
//! through the ordinary command engine as the `system` actor. Fetching the
//! rows (spreadsheet API, polling cadence, rate limits) happens elsewhere.
//!
//! Progress is an explicit [`SyncState`] value: the caller passes the previous
//! state in and stores the returned one. Nothing here is global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use workshop_commands::RecordQuizResult;
use workshop_core::{Actor, EquipmentId, MemberNumber};
use workshop_events::{DomainEvent, RecordedEvent};

use crate::command_dispatcher::{Outcome, apply_to_resource};
use crate::event_store::EventStore;

/// One response row as read from a quiz sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRow {
    pub equipment_id: EquipmentId,
    pub training_sheet_id: String,
    pub timestamp_epoch_ms: i64,
    pub email: Option<String>,
    /// Raw cell; quiz takers mistype these.
    pub member_number: Option<String>,
    /// Raw cell, e.g. `"7 / 10"`.
    pub score: String,
}

impl QuizRow {
    fn to_command(&self) -> Option<RecordQuizResult> {
        let (score, max_score) = parse_score(&self.score)?;
        Some(RecordQuizResult {
            equipment_id: self.equipment_id,
            training_sheet_id: self.training_sheet_id.clone(),
            member_number_provided: self
                .member_number
                .as_deref()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(MemberNumber::new),
            email_provided: self
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            score,
            max_score,
            timestamp_epoch_ms: self.timestamp_epoch_ms,
        })
    }
}

/// Parse `"score / max"`. Max must be positive and not below the score.
pub fn parse_score(raw: &str) -> Option<(u32, u32)> {
    let (score, max) = raw.split_once('/')?;
    let score: u32 = score.trim().parse().ok()?;
    let max: u32 = max.trim().parse().ok()?;
    (max > 0 && score <= max).then_some((score, max))
}

/// Newest row timestamp handled per piece of equipment.
///
/// Several rows can share a timestamp, so rows *at* `last_seen` are offered
/// again on the next pass; the duplicate check in `RecordQuizResult` turns
/// the ones already recorded into no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    last_seen: BTreeMap<EquipmentId, i64>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from results already in the log, e.g. after a restart.
    pub fn from_events(events: &[RecordedEvent]) -> Self {
        let mut state = Self::new();
        for e in events {
            if let DomainEvent::EquipmentTrainingQuizResult(q) = &e.event {
                state.advance(q.equipment_id, q.timestamp_epoch_ms);
            }
        }
        state
    }

    pub fn last_seen(&self, equipment_id: EquipmentId) -> Option<i64> {
        self.last_seen.get(&equipment_id).copied()
    }

    fn advance(&mut self, equipment_id: EquipmentId, timestamp_epoch_ms: i64) {
        let seen = self.last_seen.entry(equipment_id).or_insert(timestamp_epoch_ms);
        *seen = (*seen).max(timestamp_epoch_ms);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub equipment_id: EquipmentId,
    pub timestamp_epoch_ms: i64,
    pub error: String,
}

/// What one sync pass did with its rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub recorded: usize,
    /// Applied, but the decision function raised nothing (duplicate result,
    /// unknown equipment).
    pub unchanged: usize,
    /// Rows older than the equipment's `last_seen`.
    pub already_seen: usize,
    /// Rows whose score cell could not be parsed. Skipped for good.
    pub invalid: usize,
    /// Rows left for the next pass because an earlier row for the same
    /// equipment failed.
    pub deferred: usize,
    pub failures: Vec<SyncFailure>,
}

/// Commit every unseen row, oldest first within each piece of equipment.
///
/// A store failure stops that equipment's rows for this pass without moving
/// its `last_seen`, so the next pass retries from the failed row.
#[instrument(skip_all, fields(rows = rows.len()))]
pub async fn sync_quiz_results<S>(store: &S, mut state: SyncState, rows: &[QuizRow]) -> (SyncState, SyncReport)
where
    S: EventStore + ?Sized,
{
    let mut by_equipment: BTreeMap<EquipmentId, Vec<&QuizRow>> = BTreeMap::new();
    for row in rows {
        by_equipment.entry(row.equipment_id).or_default().push(row);
    }

    let mut report = SyncReport::default();
    for (equipment_id, mut rows) in by_equipment {
        rows.sort_by_key(|r| r.timestamp_epoch_ms);
        let mut blocked = false;

        for row in rows {
            if blocked {
                report.deferred += 1;
                continue;
            }
            if state
                .last_seen(equipment_id)
                .is_some_and(|seen| row.timestamp_epoch_ms < seen)
            {
                report.already_seen += 1;
                continue;
            }

            let Some(command) = row.to_command() else {
                warn!(%equipment_id, score = %row.score, "unparseable quiz row");
                report.invalid += 1;
                state.advance(equipment_id, row.timestamp_epoch_ms);
                continue;
            };

            match apply_to_resource(store, &command, &Actor::System).await {
                Ok(Outcome::Committed(_)) => report.recorded += 1,
                Ok(Outcome::NoNewEvent) => report.unchanged += 1,
                Err(err) => {
                    warn!(%equipment_id, error = %err, "quiz row not recorded");
                    report.failures.push(SyncFailure {
                        equipment_id,
                        timestamp_epoch_ms: row.timestamp_epoch_ms,
                        error: err.to_string(),
                    });
                    blocked = true;
                    continue;
                }
            }
            state.advance(equipment_id, row.timestamp_epoch_ms);
        }
    }

    info!(
        recorded = report.recorded,
        unchanged = report.unchanged,
        failed = report.failures.len(),
        "quiz sync finished"
    );
    (state, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use workshop_commands::{AddEquipment, CreateArea};
    use workshop_core::AreaId;

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;
    use crate::projections::equipment;

    async fn store_with_equipment() -> (InMemoryEventStore, EquipmentId) {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let area_id = AreaId::new();
        let equipment_id = EquipmentId::new();
        let admin = Actor::admin_token();
        dispatcher
            .apply_to_resource(&CreateArea { id: area_id, name: "Laser".into() }, &admin)
            .await
            .unwrap();
        dispatcher
            .apply_to_resource(
                &AddEquipment { id: equipment_id, name: "Cutter".into(), area_id },
                &admin,
            )
            .await
            .unwrap();
        (dispatcher.into_inner(), equipment_id)
    }

    fn row(equipment_id: EquipmentId, ts: i64, score: &str) -> QuizRow {
        QuizRow {
            equipment_id,
            training_sheet_id: "sheet-1".into(),
            timestamp_epoch_ms: ts,
            email: Some(" quiz@example.com ".into()),
            member_number: Some("1234".into()),
            score: score.into(),
        }
    }

    #[test]
    fn scores_parse_with_loose_spacing() {
        assert_eq!(parse_score("7 / 10"), Some((7, 10)));
        assert_eq!(parse_score("10/10"), Some((10, 10)));
        assert_eq!(parse_score("11 / 10"), None);
        assert_eq!(parse_score("3 / 0"), None);
        assert_eq!(parse_score("seven"), None);
    }

    #[test]
    fn mistyped_member_number_is_dropped() {
        let mut r = row(EquipmentId::new(), 1, "1 / 1");
        r.member_number = Some("12a".into());
        let cmd = r.to_command().unwrap();
        assert_eq!(cmd.member_number_provided, None);
        assert_eq!(cmd.email_provided.as_deref(), Some("quiz@example.com"));
    }

    #[tokio::test]
    async fn records_new_rows_and_skips_seen_ones() {
        let (store, eq) = store_with_equipment().await;
        let rows = vec![row(eq, 2_000, "10 / 10"), row(eq, 1_000, "6 / 10")];

        let (state, report) = sync_quiz_results(&store, SyncState::new(), &rows).await;
        assert_eq!(report.recorded, 2);
        assert_eq!(state.last_seen(eq), Some(2_000));

        let events = store.get_all_events().await.unwrap();
        let recorded = equipment::get(&events, eq).unwrap();
        let timestamps: Vec<i64> = recorded.quiz_results.iter().map(|q| q.timestamp_epoch_ms).collect();
        assert_eq!(timestamps, vec![1_000, 2_000]);
        assert_eq!(recorded.quiz_results[1].percentage, 100);

        let (state, report) = sync_quiz_results(&store, state, &rows).await;
        assert_eq!(report.already_seen, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.recorded, 0);
        assert_eq!(SyncState::from_events(&store.get_all_events().await.unwrap()), state);
    }

    #[tokio::test]
    async fn rows_sharing_a_timestamp_are_all_recorded() {
        let (store, eq) = store_with_equipment().await;
        let mut first = row(eq, 5_000, "10 / 10");
        first.member_number = Some("1".into());
        let mut second = row(eq, 5_000, "8 / 10");
        second.member_number = Some("2".into());

        let (state, report) = sync_quiz_results(&store, SyncState::new(), &[first.clone()]).await;
        assert_eq!(report.recorded, 1);

        // The second row shows up in a later pull with the same timestamp.
        let (_, report) = sync_quiz_results(&store, state, &[first, second]).await;
        assert_eq!(report.recorded, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.already_seen, 0);

        let events = store.get_all_events().await.unwrap();
        let members: Vec<_> = equipment::get(&events, eq)
            .unwrap()
            .quiz_results
            .iter()
            .map(|q| q.member_number_provided)
            .collect();
        assert_eq!(members, vec![Some(MemberNumber::new(1)), Some(MemberNumber::new(2))]);
    }

    #[tokio::test]
    async fn same_timestamp_rows_in_one_pass_are_all_recorded() {
        let (store, eq) = store_with_equipment().await;
        let mut first = row(eq, 5_000, "10 / 10");
        first.member_number = Some("1".into());
        let mut second = row(eq, 5_000, "10 / 10");
        second.member_number = Some("2".into());

        let (_, report) = sync_quiz_results(&store, SyncState::new(), &[first, second]).await;
        assert_eq!(report.recorded, 2);
        assert_eq!(report.already_seen, 0);
    }

    #[tokio::test]
    async fn fresh_state_does_not_duplicate_results() {
        let (store, eq) = store_with_equipment().await;
        let rows = vec![row(eq, 1_000, "9 / 10")];

        sync_quiz_results(&store, SyncState::new(), &rows).await;
        let (_, report) = sync_quiz_results(&store, SyncState::new(), &rows).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn invalid_rows_are_counted_and_passed_over() {
        let (store, eq) = store_with_equipment().await;
        let rows = vec![row(eq, 1_000, "n/a"), row(eq, 2_000, "5 / 5")];

        let (state, report) = sync_quiz_results(&store, SyncState::new(), &rows).await;
        assert_eq!(report.invalid, 1);
        assert_eq!(report.recorded, 1);
        assert_eq!(state.last_seen(eq), Some(2_000));
    }

    #[tokio::test]
    async fn unknown_equipment_changes_nothing() {
        let store = InMemoryEventStore::new();
        let eq = EquipmentId::new();
        let (state, report) = sync_quiz_results(&store, SyncState::new(), &[row(eq, 5, "1 / 1")]).await;
        assert_eq!(report.unchanged, 1);
        assert!(store.is_empty());
        assert_eq!(state.last_seen(eq), Some(5));
    }
}
