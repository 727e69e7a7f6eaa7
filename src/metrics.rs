//! Engine counters in Prometheus text exposition format

use crate::crash::types::Amount;
use crate::errors::EngineError;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct EngineMetrics {
    registry: Registry,
    operations: IntCounterVec,
    wagered: IntCounter,
    paid_out: IntCounter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new(
                "balloonfly_operations_total",
                "Engine operations by name and outcome",
            ),
            &["operation", "outcome"],
        )?;
        let wagered = IntCounter::new(
            "balloonfly_wagered_total",
            "Stake accepted into the pool, in base units",
        )?;
        let paid_out = IntCounter::new(
            "balloonfly_paid_out_total",
            "Cash-out payouts sent to players, in base units",
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(wagered.clone()))?;
        registry.register(Box::new(paid_out.clone()))?;

        Ok(Self {
            registry,
            operations,
            wagered,
            paid_out,
        })
    }

    /// Count one operation. The outcome label is `ok`, the business error
    /// name, or the infrastructure failure class.
    pub fn observe<T>(&self, operation: &str, result: &Result<T, EngineError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(EngineError::Game(e)) => e.name(),
            Err(EngineError::Storage(_)) => "storage_error",
            Err(EngineError::Configuration(_)) => "configuration_error",
            Err(EngineError::AlreadyInitialized { .. }) => "already_initialized",
        };
        self.operations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_wager(&self, amount: Amount) {
        self.wagered.inc_by(saturating_u64(amount));
    }

    pub fn record_payout(&self, payout: Amount) {
        self.paid_out.inc_by(saturating_u64(payout));
    }

    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[operation, outcome])
            .get()
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn saturating_u64(amount: Amount) -> u64 {
    u64::try_from(amount.max(0)).unwrap_or(u64::MAX)
}
