//! Idealized sea-ice climate models.
//!
//! Currently provides the single-column moist energy balance model with sea ice
//! ([`components::mebm`]) and the tridiagonal solver it relies on.

pub mod components;
pub mod utils;
