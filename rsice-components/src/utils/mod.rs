pub mod linear_algebra;
