use rust_decimal::Decimal;

/// Shares per lot. Ledger quantities are always counted in lots.
pub const LOT_SIZE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Closing prices are searched for in this many days, ending at the requested date.
pub const PRICE_WINDOW_DAYS: i64 = 7;

/// Default Yahoo Finance API endpoint. Override with the `YAHOO_URL` environment variable.
pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";

/// Default suffix appended to ledger tickers for market data lookups (Taiwan Stock Exchange).
pub const DEFAULT_TICKER_SUFFIX: &str = ".TW";

// Ledger columns
pub const DATE_COLUMN: &str = "Date";
pub const TICKER_COLUMN: &str = "Ticker";
pub const BUY_COLUMN: &str = "Buy";
pub const SALE_COLUMN: &str = "Sale";
pub const PRICE_COLUMN: &str = "Price";
pub const TOTAL_COLUMN: &str = "Total";

/// Columns that must be present in the ledger header.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    DATE_COLUMN,
    TICKER_COLUMN,
    BUY_COLUMN,
    SALE_COLUMN,
    PRICE_COLUMN,
];

// Output sheets
pub const SUMMARY_SHEET: &str = "Summary";
pub const DIVIDENDS_SHEET: &str = "Dividends";
pub const REALIZE_GAIN_LOSS_SHEET: &str = "RealizeGainLoss";
pub const UNREALIZE_GAIN_LOSS_SHEET: &str = "UnrealizeGainLoss";
