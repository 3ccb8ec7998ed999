pub mod chat;
pub mod docsearch;
pub mod indexer;
pub mod query;
