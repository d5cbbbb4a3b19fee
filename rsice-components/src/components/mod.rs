pub mod humidity;
pub mod mebm;

pub use humidity::saturation_specific_humidity;
pub use mebm::{
    default_initial_temperature, Mebm, MebmDiagnostics, MebmGrid, MebmOptions, MebmOutput,
    MebmParameters,
};
