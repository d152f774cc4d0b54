//! # Utils Module
//!
//! Input-data-file loading (the JSON record carrying the species list,
//! property-correlation parameters and case defaults) and logger setup.

pub mod load_from_file;
pub mod logging;
