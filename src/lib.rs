pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod hints;
pub mod navigation;
pub mod page;
pub mod prediction;
pub mod server;
pub mod session;

#[cfg(test)]
pub mod testing;
