//! Book P/L history. Feeds historical VaR and drawdown.
//! All methods are in-place on bounded buffers.
use std::collections::VecDeque;

/// Rolling window of mark-to-market changes kept for VaR
const PNL_WINDOW: usize = 500;

#[derive(Debug, Clone, serde::Serialize)]
pub struct PnlTracker {
    /// Book value at the first mark
    pub initial_value: f64,
    pub last_value: f64,
    pub peak_value: f64,
    pub max_drawdown: f64,
    pub marks_recorded: u64,
    /// Change in book value between consecutive marks
    #[serde(skip)]
    changes: VecDeque<f64>,
}

impl PnlTracker {
    pub fn new() -> Self {
        Self {
            initial_value: 0.0,
            last_value: 0.0,
            peak_value: 0.0,
            max_drawdown: 0.0,
            marks_recorded: 0,
            changes: VecDeque::with_capacity(PNL_WINDOW),
        }
    }

    /// Record a new book valuation. Non-finite values are ignored.
    pub fn record(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        if self.marks_recorded == 0 {
            self.initial_value = value;
            self.peak_value = value;
        } else {
            if self.changes.len() >= PNL_WINDOW {
                self.changes.pop_front();
            }
            self.changes.push_back(value - self.last_value);
        }

        self.last_value = value;
        self.marks_recorded += 1;
        self.update_drawdown();
    }

    fn update_drawdown(&mut self) {
        if self.last_value > self.peak_value {
            self.peak_value = self.last_value;
        }
        let dd = self.peak_value - self.last_value;
        if dd > self.max_drawdown {
            self.max_drawdown = dd;
        }
    }

    /// Cumulative P/L since the first mark.
    #[inline]
    pub fn total_pnl(&self) -> f64 {
        self.last_value - self.initial_value
    }

    /// Contiguous copy of the P/L change window.
    pub fn changes(&self) -> Vec<f64> {
        self.changes.iter().copied().collect()
    }
}

impl Default for PnlTracker {
    fn default() -> Self {
        Self::new()
    }
}
