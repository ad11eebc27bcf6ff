pub use self::{report::*, stats::*};

pub mod amount;
pub mod constants;
pub mod ledger;
mod report;
mod stats;
pub mod table;
