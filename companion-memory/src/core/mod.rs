pub mod clients;
pub mod config;
pub mod memory;
pub mod retry;
pub mod storage;
