#![forbid(unsafe_code)]

pub mod errors;
pub mod gains;
pub mod imports;
pub mod market;
pub mod model;
pub mod position;
pub mod util;
