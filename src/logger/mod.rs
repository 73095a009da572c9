//! Decision logging: activity channel feeding an append-only JSONL writer.

pub mod activity;
pub mod jsonl;
