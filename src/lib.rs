//! Sea-ice ensemble analysis.
//!
//! Loads CESM sea-ice area ensembles, extracts one calendar month, reduces across
//! members and plots the spread. The data handling lives in [`rsice_core`], the
//! idealized SCM-MEBM in [`rsice_components`]; this crate adds the renderer and
//! the pipeline that ties them together. [`icepack`] plots Icepack
//! single-column history output.

pub mod icepack;
pub mod pipeline;
pub mod render;

pub use rsice_components;
pub use rsice_core;
