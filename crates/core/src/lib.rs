pub mod clock;
pub mod error;
pub mod ids;
pub mod submit;
pub mod value;

pub use clock::{MonotonicClock, Timestamp};
pub use error::{CoreError, ValidationError};
pub use ids::*;
pub use submit::SubmitRanking;
pub use value::{Rank, RankingValue, TasteStatus};
