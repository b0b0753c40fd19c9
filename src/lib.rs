//! Label print agent
//!
//! Background agent that polls a remote job queue for pending label print
//! jobs, claims each one exclusively, prints it on a local printer, and
//! reports the outcome back to the service.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
