pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod upload;
pub mod workflow;

pub use db::create_pool;
