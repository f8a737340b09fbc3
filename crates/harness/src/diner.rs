use platerank_core::{
    ids::*,
    submit::SubmitRanking,
    value::{RankingValue, TasteStatus},
};
use platerank_engine::{Engine, EngineError, SubmitOutcome};
use platerank_storage::RankingStore;

/// A test wrapper around one engine instance with a default registered
/// user, so tests read as "this diner ranks that dish".
pub struct TestDiner {
    pub engine: Engine,
    pub user_id: UserId,
}

impl TestDiner {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_engine(Engine::open_in_memory()?)
    }

    /// Open against a file-backed store, for tests that share one
    /// database across several engine instances.
    pub fn open(path: &str) -> Result<Self, EngineError> {
        Self::with_engine(Engine::open(path)?)
    }

    fn with_engine(mut engine: Engine) -> Result<Self, EngineError> {
        let user_id = UserId::new();
        engine.store_mut().register_user(user_id)?;
        Ok(Self { engine, user_id })
    }

    /// Register an additional user identity for cross-user tests.
    pub fn new_user(&mut self) -> Result<UserId, EngineError> {
        let user_id = UserId::new();
        self.engine.store_mut().register_user(user_id)?;
        Ok(user_id)
    }

    pub fn new_dish(&mut self) -> Result<DishId, EngineError> {
        let dish_id = DishId::new();
        self.engine.store_mut().register_dish(dish_id)?;
        Ok(dish_id)
    }

    pub fn new_restaurant(&mut self) -> Result<RestaurantId, EngineError> {
        let restaurant_id = RestaurantId::new();
        self.engine.store_mut().register_restaurant(restaurant_id)?;
        Ok(restaurant_id)
    }

    /// Build a well-formed submission for the default user; tests tweak
    /// individual fields before submitting.
    pub fn request(
        &self,
        dish_id: DishId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        value: RankingValue,
    ) -> SubmitRanking {
        SubmitRanking {
            user_id: self.user_id,
            dish_id,
            restaurant_id,
            dish_type: dish_type.to_string(),
            value,
            notes: "tasting notes".into(),
            photo_refs: vec!["photos/dish.jpg".into()],
        }
    }

    pub fn submit(&mut self, req: &SubmitRanking) -> Result<SubmitOutcome, EngineError> {
        self.engine.submit_ranking(req)
    }

    /// Submit a numeric rank as the default user.
    pub fn rank_dish(
        &mut self,
        dish_id: DishId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        rank: u8,
    ) -> Result<SubmitOutcome, EngineError> {
        let req = self.request(
            dish_id,
            restaurant_id,
            dish_type,
            RankingValue::numeric(rank)?,
        );
        self.engine.submit_ranking(&req)
    }

    /// Submit a numeric rank on behalf of another registered user.
    pub fn rank_dish_as(
        &mut self,
        user_id: UserId,
        dish_id: DishId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        rank: u8,
    ) -> Result<SubmitOutcome, EngineError> {
        let mut req = self.request(
            dish_id,
            restaurant_id,
            dish_type,
            RankingValue::numeric(rank)?,
        );
        req.user_id = user_id;
        self.engine.submit_ranking(&req)
    }

    /// Submit a taste status instead of a numeric rank.
    pub fn rate_dish(
        &mut self,
        dish_id: DishId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        status: TasteStatus,
    ) -> Result<SubmitOutcome, EngineError> {
        let req = self.request(
            dish_id,
            restaurant_id,
            dish_type,
            RankingValue::status(status),
        );
        self.engine.submit_ranking(&req)
    }
}
