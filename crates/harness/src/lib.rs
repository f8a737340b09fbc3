pub mod diner;

pub use diner::TestDiner;
