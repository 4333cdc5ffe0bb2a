//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the phases of the pagination state machine
//! - `CrawlState`: page ordinal, link counters and error streak of one crawl

mod crawl_phase;
mod crawl_state;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use crawl_state::CrawlState;
