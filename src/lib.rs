pub mod agent;
pub mod availability;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod observability;
pub mod schedule;
pub mod tools;
pub mod wal;
