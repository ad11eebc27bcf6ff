pub use crate::gains::GainsError;
pub use crate::imports::ledger::LedgerError;
pub use crate::market::db::PriceDbError;
pub use crate::market::MarketDataError;
pub use crate::model::amount::ConvertAmountError;
pub use crate::model::table::TableError;
