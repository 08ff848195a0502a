pub mod aggregate;
pub mod clients;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod http;
pub mod logging;
pub mod media;
pub mod schedule;
pub mod units;
