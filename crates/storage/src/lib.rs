#![forbid(unsafe_code)]

//! Persistence adapters for the progress engine: repository ports, an
//! in-memory backend for tests, a `SQLite` backend, and the best-effort
//! resume/timer cache.

pub mod cache;
pub mod repository;
pub mod sqlite;
