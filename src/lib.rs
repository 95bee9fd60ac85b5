pub mod audit;
pub mod background;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod search;
pub mod utils;

#[cfg(test)]
mod testutil;
