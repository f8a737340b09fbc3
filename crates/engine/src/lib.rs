pub mod error;
pub mod stats;

pub use error::EngineError;
pub use stats::{DishRankingSummary, RankCounts, TasteStatusCounts, UserRankingStats};

use platerank_core::{
    clock::MonotonicClock,
    ids::*,
    submit::SubmitRanking,
    value::{Rank, RankingValue},
};
use platerank_storage::{
    DishStatRecord, HistoryRecord, IdentityKind, RankingRecord, RankingStore, SqliteStore,
};

/// Result of a committed submission: the affected ranking plus the
/// refreshed dish-level aggregate, mirroring what the API layer returns
/// to clients.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub ranking_id: RankingId,
    /// True when this submission created the ranking row.
    pub created: bool,
    /// False for an unchanged resubmission (no write, no history entry).
    pub changed: bool,
    /// The ranking automatically demoted to rank 2, if any.
    pub demoted: Option<RankingId>,
    pub dish_summary: DishRankingSummary,
}

pub struct Engine {
    store: SqliteStore,
    clock: MonotonicClock,
}

impl Engine {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            clock: MonotonicClock::new(),
        }
    }

    pub fn open(path: &str) -> Result<Self, EngineError> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::new(SqliteStore::open_in_memory()?))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    /// Check that every referenced identity is known. The engine never
    /// auto-creates missing users, dishes, or restaurants.
    fn require_known(&self, req: &SubmitRanking) -> Result<(), EngineError> {
        if !self.store.user_exists(req.user_id)? {
            return Err(EngineError::NotFound {
                kind: IdentityKind::User,
                id: req.user_id.to_string(),
            });
        }
        if !self.store.dish_exists(req.dish_id)? {
            return Err(EngineError::NotFound {
                kind: IdentityKind::Dish,
                id: req.dish_id.to_string(),
            });
        }
        if !self.store.restaurant_exists(req.restaurant_id)? {
            return Err(EngineError::NotFound {
                kind: IdentityKind::Restaurant,
                id: req.restaurant_id.to_string(),
            });
        }
        Ok(())
    }

    /// Apply one ranking submission: validate, resolve any One-Best
    /// conflict by demoting the current rank-1 holder, write the primary
    /// row, and append history entries, all inside one immediate
    /// transaction. A concurrent writer that holds the lock past the
    /// busy timeout surfaces as `ConflictAbort`; the caller retries the
    /// whole call.
    pub fn submit_ranking(&mut self, req: &SubmitRanking) -> Result<SubmitOutcome, EngineError> {
        req.validate()?;
        self.require_known(req)?;

        self.store.begin_immediate()?;
        match self.submit_in_tx(req) {
            Ok(outcome) => {
                self.store.commit()?;
                tracing::debug!(
                    ranking = %outcome.ranking_id,
                    created = outcome.created,
                    demoted = ?outcome.demoted,
                    "ranking submission committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                let _ = self.store.rollback();
                Err(e)
            }
        }
    }

    fn submit_in_tx(&mut self, req: &SubmitRanking) -> Result<SubmitOutcome, EngineError> {
        let existing = self
            .store
            .get_ranking(req.user_id, req.dish_id, req.restaurant_id)?;

        // One-Best conflict: at most one other row in the same
        // (user, restaurant, bucket) can hold rank 1. Demote it to 2 and
        // record the transition before touching the primary row.
        let mut demoted = None;
        if req.value.is_best() {
            let exclude = existing.as_ref().map(|r| r.ranking_id);
            if let Some(holder) =
                self.store
                    .find_best_in_bucket(req.user_id, req.restaurant_id, &req.dish_type, exclude)?
            {
                let ts = self.clock.tick()?;
                self.store.append_history(&HistoryRecord {
                    entry_id: HistoryEntryId::new(),
                    ranking_id: holder.ranking_id,
                    user_id: holder.user_id,
                    dish_id: holder.dish_id,
                    restaurant_id: holder.restaurant_id,
                    dish_type: holder.dish_type.clone(),
                    previous: Some(holder.value),
                    new: RankingValue::Numeric(Rank::RUNNER_UP),
                    notes: holder.notes.clone(),
                    photo_refs: holder.photo_refs.clone(),
                    created_at: ts,
                })?;
                self.store
                    .demote_ranking(holder.ranking_id, Rank::RUNNER_UP, ts)?;
                tracing::info!(
                    ranking = %holder.ranking_id,
                    dish = %holder.dish_id,
                    bucket = %req.dish_type,
                    "demoted previous best to rank 2"
                );
                demoted = Some(holder.ranking_id);
            }
        }

        let (record, created, changed) = match existing {
            Some(prev) => {
                let unchanged = prev.value == req.value
                    && prev.dish_type == req.dish_type
                    && prev.notes == req.notes
                    && prev.photo_refs == req.photo_refs;
                if unchanged {
                    (prev, false, false)
                } else {
                    let ts = self.clock.tick()?;
                    let record = RankingRecord {
                        dish_type: req.dish_type.clone(),
                        value: req.value,
                        notes: req.notes.clone(),
                        photo_refs: req.photo_refs.clone(),
                        updated_at: ts,
                        ..prev.clone()
                    };
                    self.store.update_ranking(&record)?;
                    self.append_primary_history(&record, Some(prev.value))?;
                    (record, false, true)
                }
            }
            None => {
                let ts = self.clock.tick()?;
                let record = RankingRecord {
                    ranking_id: RankingId::new(),
                    user_id: req.user_id,
                    dish_id: req.dish_id,
                    restaurant_id: req.restaurant_id,
                    dish_type: req.dish_type.clone(),
                    value: req.value,
                    notes: req.notes.clone(),
                    photo_refs: req.photo_refs.clone(),
                    created_at: ts,
                    updated_at: ts,
                };
                self.store.insert_ranking(&record)?;
                self.append_primary_history(&record, None)?;
                (record, true, true)
            }
        };

        let dish_summary = self.dish_summary_for(req.dish_id)?;
        Ok(SubmitOutcome {
            ranking_id: record.ranking_id,
            created,
            changed,
            demoted,
            dish_summary,
        })
    }

    fn append_primary_history(
        &mut self,
        record: &RankingRecord,
        previous: Option<RankingValue>,
    ) -> Result<(), EngineError> {
        let ts = self.clock.tick()?;
        self.store.append_history(&HistoryRecord {
            entry_id: HistoryEntryId::new(),
            ranking_id: record.ranking_id,
            user_id: record.user_id,
            dish_id: record.dish_id,
            restaurant_id: record.restaurant_id,
            dish_type: record.dish_type.clone(),
            previous,
            new: record.value,
            notes: record.notes.clone(),
            photo_refs: record.photo_refs.clone(),
            created_at: ts,
        })?;
        Ok(())
    }

    fn dish_summary_for(&self, dish_id: DishId) -> Result<DishRankingSummary, EngineError> {
        let rankings = self.store.get_rankings_for_dish(dish_id)?;
        Ok(stats::dish_summary_from(dish_id, &rankings))
    }

    // ========================================================================
    // Statistics Aggregator (read-only)
    // ========================================================================

    /// Per-user rollup over current rankings. Zeroed counters, not an
    /// error, when the user has no rankings.
    pub fn user_stats(&self, user_id: UserId) -> Result<UserRankingStats, EngineError> {
        let rankings = self.store.get_rankings_for_user(user_id)?;
        Ok(stats::user_stats_from(user_id, rankings))
    }

    /// Cross-user aggregate for one dish.
    pub fn dish_summary(&self, dish_id: DishId) -> Result<DishRankingSummary, EngineError> {
        self.dish_summary_for(dish_id)
    }

    /// Per-(user, dish) rollup, recomputed from the rankings table.
    pub fn dish_stat(
        &self,
        user_id: UserId,
        dish_id: DishId,
    ) -> Result<DishStatRecord, EngineError> {
        Ok(self.store.get_dish_stat(user_id, dish_id)?)
    }

    // ========================================================================
    // History Log (append-only; no update or delete surface)
    // ========================================================================

    /// All history for one ranking, oldest first.
    pub fn history(&self, ranking_id: RankingId) -> Result<Vec<HistoryRecord>, EngineError> {
        Ok(self.store.get_history(ranking_id)?)
    }

    // ========================================================================
    // Query Pass-Through
    // ========================================================================

    pub fn get_ranking(
        &self,
        user_id: UserId,
        dish_id: DishId,
        restaurant_id: RestaurantId,
    ) -> Result<Option<RankingRecord>, EngineError> {
        Ok(self.store.get_ranking(user_id, dish_id, restaurant_id)?)
    }

    pub fn get_ranking_by_id(
        &self,
        ranking_id: RankingId,
    ) -> Result<Option<RankingRecord>, EngineError> {
        Ok(self.store.get_ranking_by_id(ranking_id)?)
    }

    pub fn count_best_in_bucket(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        dish_type: &str,
    ) -> Result<u64, EngineError> {
        Ok(self
            .store
            .count_best_in_bucket(user_id, restaurant_id, dish_type)?)
    }

    pub fn ranking_count(&self) -> Result<u64, EngineError> {
        Ok(self.store.ranking_count()?)
    }

    pub fn history_count(&self) -> Result<u64, EngineError> {
        Ok(self.store.history_count()?)
    }
}
