//! Admission control for Boardroom.
//!
//! Bounds how many sessions one origin (usually a client IP) may create
//! per time window. It knows nothing about sessions themselves: the
//! session registry asks [`AdmissionController::admit`] before spawning
//! one, and nothing else in the system is throttled.

mod config;
mod controller;
mod error;

pub use config::AdmissionConfig;
pub use controller::{Admission, AdmissionController};
pub use error::AdmissionError;
