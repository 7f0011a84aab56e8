// Library exports for Moments
// This allows integration tests and the binary to share the app modules

pub mod admin;
pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod icebreaker;
pub mod interaction;
pub mod routes;
pub mod state;
pub mod upload;
pub mod views;
