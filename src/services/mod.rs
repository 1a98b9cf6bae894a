pub mod aggregator;
pub mod fallback;
pub mod fetcher;
pub mod indicators;
pub mod session;
pub mod stage;
