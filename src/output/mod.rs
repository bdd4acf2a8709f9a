//! Output module for thread descriptions and reports
//!
//! This module handles:
//! - Writing one description file per thread
//! - Reading statistics back from the ledger
//! - Printing the summary of a finished crawl

mod description;
pub mod stats;

pub use description::{
    description_path, format_post_block, thread_directory, write_description,
};
pub use stats::{load_statistics, print_statistics, print_summary, LedgerStatistics};
