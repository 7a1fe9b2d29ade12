pub mod raw;
pub mod kspace;
