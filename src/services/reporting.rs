use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    bus::EventBus,
    events::{CycleRecord, Event, TradeRecord},
    exchange::types::Side,
};

/// One line of the JSONL trade history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: String,

    /// "BUY" | "SELL" | "CYCLE"
    pub kind: String,

    pub amount: f64,

    /// Execution price (BUY/SELL only)
    pub price: Option<f64>,

    /// Cycle legs (CYCLE only)
    pub sell_price: Option<f64>,
    pub buy_price: Option<f64>,

    /// Quote-currency notional: cost/revenue of a trade, sell revenue of a cycle
    pub total: f64,

    /// Realized profit (CYCLE only)
    pub profit: Option<f64>,

    pub order_id: Option<String>,
}

impl From<&TradeRecord> for HistoryEntry {
    fn from(t: &TradeRecord) -> Self {
        Self {
            ts: t.timestamp.to_rfc3339(),
            kind: t.side.to_string(),
            amount: t.amount,
            price: Some(t.price),
            sell_price: None,
            buy_price: None,
            total: t.cost,
            profit: None,
            order_id: t.order_id.clone(),
        }
    }
}

impl From<&CycleRecord> for HistoryEntry {
    fn from(c: &CycleRecord) -> Self {
        Self {
            ts: c.timestamp.to_rfc3339(),
            kind: "CYCLE".to_string(),
            amount: c.amount,
            price: None,
            sell_price: Some(c.sell_price),
            buy_price: Some(c.buy_price),
            total: c.revenue,
            profit: Some(c.profit),
            order_id: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trades: u64,
    pub buys: u64,
    pub sells: u64,

    pub cycles: u64,
    pub winning_cycles: u64,
    pub losing_cycles: u64,

    /// Sum of quote notional over all trades
    pub total_volume: f64,
    pub total_profit: f64,

    pub best_cycle: Option<f64>,
    pub worst_cycle: Option<f64>,
}

impl PerformanceSummary {
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Trade(t) => {
                self.trades += 1;
                match t.side {
                    Side::Buy => self.buys += 1,
                    Side::Sell => self.sells += 1,
                }
                self.total_volume += t.cost;
            }
            Event::Cycle(c) => {
                self.cycles += 1;
                if c.profit > 0.0 {
                    self.winning_cycles += 1;
                } else if c.profit < 0.0 {
                    self.losing_cycles += 1;
                }
                self.total_profit += c.profit;
                self.best_cycle = Some(self.best_cycle.map_or(c.profit, |b| b.max(c.profit)));
                self.worst_cycle = Some(self.worst_cycle.map_or(c.profit, |w| w.min(c.profit)));
            }
        }
    }

    pub fn win_rate_pct(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        self.winning_cycles as f64 / self.cycles as f64 * 100.0
    }
}

/// Writes the append-only trade history and a running summary next to it.
#[derive(Clone)]
pub struct TradeReporter {
    summary: Arc<Mutex<PerformanceSummary>>,
    log_path: PathBuf,
}

impl TradeReporter {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            summary: Arc::new(Mutex::new(PerformanceSummary::default())),
            log_path,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn summary_path(&self) -> PathBuf {
        self.log_path.with_extension("summary.json")
    }

    pub fn summary(&self) -> PerformanceSummary {
        self.lock_summary().clone()
    }

    fn lock_summary(&self) -> MutexGuard<'_, PerformanceSummary> {
        self.summary.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe now and persist events in the background.
    pub async fn start(&self, event_bus: EventBus) {
        let mut rx = event_bus.subscribe();
        let reporter = self.clone();

        tokio::spawn(async move {
            info!("📈 TradeReporter started (log: {})", reporter.log_path.display());

            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = reporter.record(&event) {
                            error!("TradeReporter failed to persist event: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("TradeReporter lagged, {} event(s) not written", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Update the summary, append one history line and rewrite the summary file.
    pub fn record(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.lock_summary().apply(event);

        let entry = match event {
            Event::Trade(t) => HistoryEntry::from(t),
            Event::Cycle(c) => HistoryEntry::from(c),
        };
        self.append_jsonl(&entry)?;
        self.flush_summary()
    }

    fn append_jsonl(&self, entry: &HistoryEntry) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let line = serde_json::to_string(entry)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    fn flush_summary(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let summary_path = self.summary_path();

        if let Some(parent) = summary_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let s = self.summary();
        std::fs::write(summary_path, serde_json::to_vec_pretty(&s)?)?;
        Ok(())
    }
}
