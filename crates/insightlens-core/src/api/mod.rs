pub mod client;
pub mod types;

pub use client::{AskService, InsightClient, SaveService};
pub use types::{AskResponse, HistoryEntry, Product, SaveAck, SaveRequest};
