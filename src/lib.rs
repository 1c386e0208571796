pub mod config;
pub mod humanize;
pub mod observability;
pub mod pruner;
pub mod storage;
