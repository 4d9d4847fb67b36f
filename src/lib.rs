//! Batch "similar games" recommendations for a video game catalog.
//!
//! The engine in [`services::similarity`] is a pure function over a catalog
//! snapshot; [`services::recommendations::run_batch`] loads that snapshot from
//! a [`db::GameStore`], scores it and writes each game's list back.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;
