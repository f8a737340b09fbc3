use std::thread;
use std::time::Duration;

use platerank_core::ids::{DishId, RestaurantId, UserId};
use platerank_core::submit::SubmitRanking;
use platerank_core::value::RankingValue;
use platerank_engine::{Engine, EngineError};
use platerank_storage::RankingStore;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn request(
    user_id: UserId,
    dish_id: DishId,
    restaurant_id: RestaurantId,
    rank: u8,
) -> SubmitRanking {
    SubmitRanking {
        user_id,
        dish_id,
        restaurant_id,
        dish_type: "noodle_soup".into(),
        value: RankingValue::numeric(rank).expect("rank in range"),
        notes: "tasting notes".into(),
        photo_refs: vec!["photos/dish.jpg".into()],
    }
}

#[test]
fn writer_holding_the_lock_aborts_the_other() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rankings.db");
    let path = path.to_str().expect("utf8 temp path");

    let mut setup = Engine::open(path)?;
    let user = UserId::new();
    let dish = DishId::new();
    let restaurant = RestaurantId::new();
    setup.store_mut().register_user(user)?;
    setup.store_mut().register_dish(dish)?;
    setup.store_mut().register_restaurant(restaurant)?;

    let mut other = Engine::open(path)?;
    other.store().set_busy_timeout(Duration::from_millis(50))?;

    // First writer takes the write lock and sits on it.
    setup.store().begin_immediate()?;

    let result = other.submit_ranking(&request(user, dish, restaurant, 4));
    assert!(matches!(result, Err(EngineError::ConflictAbort(_))));
    assert_eq!(other.ranking_count()?, 0);

    // Once the lock is released the same submission goes through.
    setup.store().rollback()?;
    let outcome = other.submit_ranking(&request(user, dish, restaurant, 4))?;
    assert!(outcome.created);
    Ok(())
}

#[test]
fn concurrent_best_submissions_leave_one_best() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rankings.db");
    let path = path.to_str().expect("utf8 temp path").to_string();

    let mut setup = Engine::open(&path)?;
    let user = UserId::new();
    let restaurant = RestaurantId::new();
    setup.store_mut().register_user(user)?;
    setup.store_mut().register_restaurant(restaurant)?;

    let dishes: Vec<DishId> = (0..4).map(|_| DishId::new()).collect();
    for dish in &dishes {
        setup.store_mut().register_dish(*dish)?;
    }
    drop(setup);

    let mut handles = Vec::new();
    for dish in dishes.clone() {
        let path = path.clone();
        handles.push(thread::spawn(move || -> Result<(), EngineError> {
            let mut engine = Engine::open(&path)?;
            // BEGIN IMMEDIATE serializes writers; within the busy
            // timeout each submission eventually gets the lock, so a
            // ConflictAbort here is the caller's cue to try again.
            loop {
                match engine.submit_ranking(&request(user, dish, restaurant, 1)) {
                    Ok(_) => return Ok(()),
                    Err(EngineError::ConflictAbort(_)) => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => return Err(e),
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread panicked")?;
    }

    let check = Engine::open(&path)?;
    assert_eq!(check.ranking_count()?, dishes.len() as u64);
    assert_eq!(check.count_best_in_bucket(user, restaurant, "noodle_soup")?, 1);

    // Every submission and every demotion made it into the log.
    let expected_history = dishes.len() as u64 + (dishes.len() as u64 - 1);
    assert_eq!(check.history_count()?, expected_history);
    Ok(())
}
