#![doc = "The `taskdeck` library crate."]
#![doc = ""]
#![doc = "Personal task tracking in two halves: a REST API (credential service,"]
#![doc = "session middleware, ownership-scoped task routes) and a typed client"]
#![doc = "(HTTP adapter with refresh-and-retry, auth and task state stores, and"]
#![doc = "an event-driven toast queue). The server binary lives in `main.rs`."]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
