#[derive(Debug, Default)]
pub struct Stats {
    n_ledger_rows: i32,
    n_price_lookups: i32,
    n_dividend_events: i32,
    n_synthesized_snapshots: i32,
    n_skipped_cells: i32,
}

impl Stats {
    pub fn inc_ledgers(&mut self) {
        self.n_ledger_rows += 1;
    }

    pub fn inc_price_lookups(&mut self) {
        self.n_price_lookups += 1;
    }

    pub fn inc_dividend_events(&mut self) {
        self.n_dividend_events += 1;
    }

    pub fn inc_synthesized_snapshots(&mut self) {
        self.n_synthesized_snapshots += 1;
    }

    pub fn inc_skipped_cells(&mut self) {
        self.n_skipped_cells += 1;
    }

    pub fn ledger_rows(&self) -> i32 {
        self.n_ledger_rows
    }

    pub fn price_lookups(&self) -> i32 {
        self.n_price_lookups
    }

    pub fn pretty_print(&self) {
        println!("{self:#?}");
        println!();
    }
}
