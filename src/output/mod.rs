//! Output module for persisting harvest results
//!
//! This module handles:
//! - Appending harvested links to a newline-delimited file
//! - Appending structured records to an atomically replaced JSON array
//! - Reading link files back for the record phase

mod link_file;
mod record_file;
mod traits;

pub use link_file::{read_links, LinkFileSink, LINKS_FILE_NAME};
pub use record_file::{RecordFileSink, RECORDS_FILE_NAME};
pub use traits::{LinkSink, OutputError, OutputResult};
