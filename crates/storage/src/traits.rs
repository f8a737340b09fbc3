use std::fmt;

use platerank_core::{
    clock::Timestamp,
    ids::*,
    value::{Rank, RankingValue},
};

use crate::error::StorageError;

/// Which external identity store a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    User,
    Dish,
    Restaurant,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Dish => "dish",
            Self::Restaurant => "restaurant",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current ranking state for one (user, dish, restaurant) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRecord {
    pub ranking_id: RankingId,
    pub user_id: UserId,
    pub dish_id: DishId,
    pub restaurant_id: RestaurantId,
    pub dish_type: String,
    pub value: RankingValue,
    pub notes: String,
    pub photo_refs: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One immutable transition in a ranking's history, including transitions
/// induced by automatic demotion. Notes and photo refs are a snapshot of
/// the ranking at the time of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub entry_id: HistoryEntryId,
    pub ranking_id: RankingId,
    pub user_id: UserId,
    pub dish_id: DishId,
    pub restaurant_id: RestaurantId,
    pub dish_type: String,
    /// None on the creation entry.
    pub previous: Option<RankingValue>,
    pub new: RankingValue,
    pub notes: String,
    pub photo_refs: Vec<String>,
    pub created_at: Timestamp,
}

/// Per-(user, dish) rollup, always recomputed from the rankings table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DishStatRecord {
    pub total_rankings: u64,
    pub total_restaurants_ranked: u64,
    pub first_ranked_at: Option<Timestamp>,
    pub last_ranked_at: Option<Timestamp>,
}

pub trait RankingStore {
    fn register_user(&mut self, user_id: UserId) -> Result<(), StorageError>;

    fn register_dish(&mut self, dish_id: DishId) -> Result<(), StorageError>;

    fn register_restaurant(&mut self, restaurant_id: RestaurantId) -> Result<(), StorageError>;

    fn user_exists(&self, user_id: UserId) -> Result<bool, StorageError>;

    fn dish_exists(&self, dish_id: DishId) -> Result<bool, StorageError>;

    fn restaurant_exists(&self, restaurant_id: RestaurantId) -> Result<bool, StorageError>;

    fn get_ranking(
        &self,
        user_id: UserId,
        dish_id: DishId,
        restaurant_id: RestaurantId,
    ) -> Result<Option<RankingRecord>, StorageError>;

    fn get_ranking_by_id(
        &self,
        ranking_id: RankingId,
    ) -> Result<Option<RankingRecord>, StorageError>;

    /// The single rank-1 holder for (user, restaurant, bucket), if any.
    /// `exclude` skips the row currently being rewritten in place.
    fn find_best_in_bucket(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        exclude: Option<RankingId>,
    ) -> Result<Option<RankingRecord>, StorageError>;

    fn count_best_in_bucket(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        dish_type: &str,
    ) -> Result<u64, StorageError>;

    fn insert_ranking(&mut self, record: &RankingRecord) -> Result<(), StorageError>;

    fn update_ranking(&mut self, record: &RankingRecord) -> Result<(), StorageError>;

    fn demote_ranking(
        &mut self,
        ranking_id: RankingId,
        to: Rank,
        updated_at: Timestamp,
    ) -> Result<(), StorageError>;

    fn ranking_count(&self) -> Result<u64, StorageError>;

    fn append_history(&mut self, entry: &HistoryRecord) -> Result<(), StorageError>;

    /// All history for one ranking, creation order, oldest first.
    fn get_history(&self, ranking_id: RankingId) -> Result<Vec<HistoryRecord>, StorageError>;

    fn history_count(&self) -> Result<u64, StorageError>;

    /// Every ranking for a user, most recently updated first.
    fn get_rankings_for_user(&self, user_id: UserId)
        -> Result<Vec<RankingRecord>, StorageError>;

    /// Every ranking for a dish across all users.
    fn get_rankings_for_dish(&self, dish_id: DishId)
        -> Result<Vec<RankingRecord>, StorageError>;

    fn get_dish_stat(
        &self,
        user_id: UserId,
        dish_id: DishId,
    ) -> Result<DishStatRecord, StorageError>;
}
