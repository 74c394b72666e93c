//! Marketplace realtime chat and notification server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod events;
pub mod identity;
pub mod notify;
pub mod registry;
pub mod routes;
pub mod state;
pub mod tasks;
pub mod ws;
