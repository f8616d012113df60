pub mod apis;
pub mod cleaner;
pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;
