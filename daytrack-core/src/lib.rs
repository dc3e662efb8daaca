pub mod board;
pub mod bridge;
pub mod config;
pub mod identity;
pub mod lines;
pub mod parser;
pub mod resolver;
pub mod storage;
pub mod types;
pub mod watcher;
