use platerank_core::value::{Rank, TasteStatus};
use platerank_harness::TestDiner;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn new_best_demotes_previous_holder() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let ramen = diner.new_dish()?;

    let first = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let second = diner.rank_dish(ramen, restaurant, "noodle_soup", 1)?;

    assert_eq!(second.demoted, Some(first.ranking_id));

    let old_best = diner
        .engine
        .get_ranking_by_id(first.ranking_id)?
        .expect("demoted ranking should still exist");
    assert_eq!(old_best.value.rank(), Some(Rank::RUNNER_UP));

    let new_best = diner
        .engine
        .get_ranking_by_id(second.ranking_id)?
        .expect("new best should exist");
    assert!(new_best.value.is_best());

    assert_eq!(
        diner
            .engine
            .count_best_in_bucket(diner.user_id, restaurant, "noodle_soup")?,
        1
    );

    // The demotion is recorded against the demoted ranking, with both
    // sides of the transition.
    let history = diner.engine.history(first.ranking_id)?;
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[1].previous.and_then(|v| v.rank()).map(|r| r.get()),
        Some(1)
    );
    assert_eq!(history[1].new.rank(), Some(Rank::RUNNER_UP));
    Ok(())
}

#[test]
fn buckets_are_independent() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let curry = diner.new_dish()?;

    let soup_best = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let curry_best = diner.rank_dish(curry, restaurant, "curry", 1)?;

    // Different dish type, no conflict.
    assert!(curry_best.demoted.is_none());
    let soup = diner
        .engine
        .get_ranking_by_id(soup_best.ranking_id)?
        .expect("soup ranking should exist");
    assert!(soup.value.is_best());
    Ok(())
}

#[test]
fn restaurants_are_independent() -> TestResult {
    let mut diner = TestDiner::new()?;
    let noodle_house = diner.new_restaurant()?;
    let ramen_bar = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let ramen = diner.new_dish()?;

    let here = diner.rank_dish(pho, noodle_house, "noodle_soup", 1)?;
    let there = diner.rank_dish(ramen, ramen_bar, "noodle_soup", 1)?;

    assert!(there.demoted.is_none());
    assert_eq!(
        diner
            .engine
            .count_best_in_bucket(diner.user_id, noodle_house, "noodle_soup")?,
        1
    );
    assert_eq!(
        diner
            .engine
            .count_best_in_bucket(diner.user_id, ramen_bar, "noodle_soup")?,
        1
    );
    let _ = here;
    Ok(())
}

#[test]
fn users_are_independent() -> TestResult {
    let mut diner = TestDiner::new()?;
    let other = diner.new_user()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let ramen = diner.new_dish()?;

    let mine = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let theirs = diner.rank_dish_as(other, ramen, restaurant, "noodle_soup", 1)?;

    // One best per user, not per restaurant.
    assert!(theirs.demoted.is_none());
    let mine_record = diner
        .engine
        .get_ranking_by_id(mine.ranking_id)?
        .expect("ranking should exist");
    assert!(mine_record.value.is_best());
    Ok(())
}

#[test]
fn resubmitting_own_best_does_not_self_demote() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;

    let first = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let second = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;

    assert_eq!(second.ranking_id, first.ranking_id);
    assert!(second.demoted.is_none());
    assert!(!second.changed);

    let record = diner
        .engine
        .get_ranking_by_id(first.ranking_id)?
        .expect("ranking should exist");
    assert!(record.value.is_best());
    Ok(())
}

#[test]
fn taste_status_never_conflicts_with_best() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let ramen = diner.new_dish()?;

    let best = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let rated = diner.rate_dish(ramen, restaurant, "noodle_soup", TasteStatus::Acceptable)?;

    assert!(rated.demoted.is_none());
    let record = diner
        .engine
        .get_ranking_by_id(best.ranking_id)?
        .expect("ranking should exist");
    assert!(record.value.is_best());
    Ok(())
}

#[test]
fn chained_demotions_leave_one_best() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let dishes: Vec<_> = (0..4)
        .map(|_| diner.new_dish())
        .collect::<Result<_, _>>()?;

    let mut outcomes = Vec::new();
    for dish in &dishes {
        outcomes.push(diner.rank_dish(*dish, restaurant, "noodle_soup", 1)?);
    }

    // Each submission after the first demotes its predecessor.
    for pair in outcomes.windows(2) {
        assert_eq!(pair[1].demoted, Some(pair[0].ranking_id));
    }
    assert_eq!(
        diner
            .engine
            .count_best_in_bucket(diner.user_id, restaurant, "noodle_soup")?,
        1
    );

    // All demoted rows sit at rank 2.
    for outcome in &outcomes[..outcomes.len() - 1] {
        let record = diner
            .engine
            .get_ranking_by_id(outcome.ranking_id)?
            .expect("ranking should exist");
        assert_eq!(record.value.rank(), Some(Rank::RUNNER_UP));
    }
    Ok(())
}

#[test]
fn promoting_a_demoted_ranking_swaps_the_best() -> TestResult {
    let mut diner = TestDiner::new()?;
    let restaurant = diner.new_restaurant()?;
    let pho = diner.new_dish()?;
    let ramen = diner.new_dish()?;

    let pho_rank = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    let ramen_rank = diner.rank_dish(ramen, restaurant, "noodle_soup", 1)?;

    // Promote pho back; ramen takes the demotion this time.
    let promoted = diner.rank_dish(pho, restaurant, "noodle_soup", 1)?;
    assert_eq!(promoted.ranking_id, pho_rank.ranking_id);
    assert_eq!(promoted.demoted, Some(ramen_rank.ranking_id));

    let ramen_record = diner
        .engine
        .get_ranking_by_id(ramen_rank.ranking_id)?
        .expect("ranking should exist");
    assert_eq!(ramen_record.value.rank(), Some(Rank::RUNNER_UP));
    assert_eq!(
        diner
            .engine
            .count_best_in_bucket(diner.user_id, restaurant, "noodle_soup")?,
        1
    );
    Ok(())
}
