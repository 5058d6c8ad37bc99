pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod images;
pub mod models;
pub mod pagination;
pub mod pipeline;
pub mod relations;
pub mod routes;
pub mod seed;
pub mod shopping;
pub mod views;

#[cfg(test)]
mod test_support;
