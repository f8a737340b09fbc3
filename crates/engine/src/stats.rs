use platerank_core::{
    ids::{DishId, UserId},
    value::{Rank, RankingValue, TasteStatus},
};
use platerank_storage::RankingRecord;

/// Counts of current rankings per numeric rank, index 0 = rank 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankCounts([u64; 5]);

impl RankCounts {
    pub fn record(&mut self, rank: Rank) {
        self.0[(rank.get() - 1) as usize] += 1;
    }

    pub fn get(&self, rank: Rank) -> u64 {
        self.0[(rank.get() - 1) as usize]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TasteStatusCounts {
    pub acceptable: u64,
    pub second_chance: u64,
    pub dissatisfied: u64,
}

impl TasteStatusCounts {
    pub fn record(&mut self, status: TasteStatus) {
        match status {
            TasteStatus::Acceptable => self.acceptable += 1,
            TasteStatus::SecondChance => self.second_chance += 1,
            TasteStatus::Dissatisfied => self.dissatisfied += 1,
        }
    }

    pub fn get(&self, status: TasteStatus) -> u64 {
        match status {
            TasteStatus::Acceptable => self.acceptable,
            TasteStatus::SecondChance => self.second_chance,
            TasteStatus::Dissatisfied => self.dissatisfied,
        }
    }

    pub fn total(&self) -> u64 {
        self.acceptable + self.second_chance + self.dissatisfied
    }
}

/// Per-user view over current rankings. Zeroed when the user has ranked
/// nothing; never an error.
#[derive(Debug, Clone)]
pub struct UserRankingStats {
    pub user_id: UserId,
    pub total_rankings: u64,
    pub rank_counts: RankCounts,
    pub taste_status_counts: TasteStatusCounts,
    /// Every ranking, most recently updated first.
    pub rankings: Vec<RankingRecord>,
    /// The rank-1 rankings only, most recently updated first.
    pub top_rankings: Vec<RankingRecord>,
}

/// Cross-user aggregate for one dish. The average covers numeric ranks
/// only; taste-status rows are counted separately.
#[derive(Debug, Clone, PartialEq)]
pub struct DishRankingSummary {
    pub dish_id: DishId,
    pub total_rankings: u64,
    pub average_rank: Option<f64>,
    pub rank_counts: RankCounts,
    pub taste_status_counts: TasteStatusCounts,
}

fn tally(rankings: &[RankingRecord]) -> (RankCounts, TasteStatusCounts) {
    let mut rank_counts = RankCounts::default();
    let mut taste_counts = TasteStatusCounts::default();
    for ranking in rankings {
        match ranking.value {
            RankingValue::Numeric(rank) => rank_counts.record(rank),
            RankingValue::Status(status) => taste_counts.record(status),
        }
    }
    (rank_counts, taste_counts)
}

/// `rankings` must already be ordered most recently updated first.
pub(crate) fn user_stats_from(
    user_id: UserId,
    rankings: Vec<RankingRecord>,
) -> UserRankingStats {
    let (rank_counts, taste_status_counts) = tally(&rankings);
    let top_rankings = rankings
        .iter()
        .filter(|r| r.value.is_best())
        .cloned()
        .collect();
    UserRankingStats {
        user_id,
        total_rankings: rankings.len() as u64,
        rank_counts,
        taste_status_counts,
        rankings,
        top_rankings,
    }
}

pub(crate) fn dish_summary_from(
    dish_id: DishId,
    rankings: &[RankingRecord],
) -> DishRankingSummary {
    let (rank_counts, taste_status_counts) = tally(rankings);
    let numeric: Vec<u8> = rankings
        .iter()
        .filter_map(|r| r.value.rank().map(Rank::get))
        .collect();
    let average_rank = if numeric.is_empty() {
        None
    } else {
        let sum: u64 = numeric.iter().map(|&r| u64::from(r)).sum();
        Some(sum as f64 / numeric.len() as f64)
    };
    DishRankingSummary {
        dish_id,
        total_rankings: rankings.len() as u64,
        average_rank,
        rank_counts,
        taste_status_counts,
    }
}
