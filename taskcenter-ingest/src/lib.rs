//! taskcenter-ingest: free-form task list parsing (tickets, mentions, urgency).

pub mod parsers;

pub use parsers::keywords::{KeywordExtractor, clean_text};
pub use parsers::task_line::TaskParser;
