//! Optimistic task cache and kanban board reconciliation over a REST task
//! backend.

pub mod board;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod log;
pub mod model;
pub mod projection;

#[cfg(test)]
mod testing;

#[cfg(all(test, feature = "e2e"))]
mod e2e_tests;
