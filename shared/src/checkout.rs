use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockTake {
    pub product_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, Default)]
pub struct StockLedger {
    takes: Vec<StockTake>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, product_id: Uuid, qty: i32) {
        self.takes.push(StockTake { product_id, qty });
    }

    /// Empties the ledger, returning the takes to undo most recent first.
    pub fn drain_compensations(&mut self) -> Vec<StockTake> {
        let mut takes = std::mem::take(&mut self.takes);
        takes.reverse();
        takes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compensations_run_in_reverse() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut ledger = StockLedger::new();
        ledger.record(first, 2);
        ledger.record(second, 1);

        let order: Vec<Uuid> = ledger
            .drain_compensations()
            .iter()
            .map(|take| take.product_id)
            .collect();
        assert_eq!(order, vec![second, first]);
    }

    #[test]
    fn test_drain_leaves_ledger_empty() {
        let product_id = Uuid::new_v4();
        let mut ledger = StockLedger::new();
        ledger.record(product_id, 3);

        let drained = ledger.drain_compensations();
        assert_eq!(drained, vec![StockTake { product_id, qty: 3 }]);
        assert!(ledger.drain_compensations().is_empty());
    }
}
