//! Core data handling for sea-ice ensemble analysis.
//!
//! The modules follow the order of the analysis pipeline: [`loader`] opens a
//! [`dataset::Dataset`], [`selection`] extracts one month, [`units`] brings the
//! area into km² and [`ensemble`] reduces across members.
//!
//! [`history`], [`derived`] and [`transforms`] cover Icepack single-column
//! history output.

pub mod calendar;
pub mod config;
pub mod dataset;
pub mod derived;
pub mod ensemble;
pub mod errors;
pub mod history;
pub mod labeled;
pub mod loader;
pub mod schema;
pub mod selection;
pub mod transforms;
pub mod units;
