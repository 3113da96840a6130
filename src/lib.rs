//! Assigns a department's doctors to rooms over the weekly slot grid.
//!
//! The pipeline is validator → model builder → solver → materializer; see
//! [`service`] for the entry points and [`server`] for the HTTP surface.

pub mod config;
pub mod data;
pub mod error;
pub mod materializer;
pub mod model;
pub mod server;
pub mod service;
pub mod solver;
pub mod stats;
pub mod store;
pub mod validator;
