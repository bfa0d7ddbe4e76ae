pub mod config;
pub mod detector;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod runner;
pub mod scraper;
pub mod store;
#[cfg(test)]
mod test_server;
pub mod twitter;
