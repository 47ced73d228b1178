//! Currency rates for cost records.
//!
//! Conversion into the reference currency degrades instead of failing:
//! same-day rate, then the latest known rate, then the original amount left
//! unconverted and flagged. Every lookup is time-boxed.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use stockwise_core::Currency;

#[derive(Debug, Clone, Error)]
pub enum RateError {
    #[error("rate service unavailable: {0}")]
    Unavailable(String),

    #[error("rate lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// External source of currency rates.
///
/// A rate converts one unit of `from` into `to`.
pub trait RateService: Send + Sync {
    fn get_rate(&self, from: Currency, to: Currency, date: NaiveDate) -> Result<Option<Decimal>, RateError>;

    /// Most recent rate on record, with its date.
    fn latest_rate(&self, from: Currency, to: Currency) -> Result<Option<(NaiveDate, Decimal)>, RateError>;

    /// `None` when no rate is on record or the converted amount does not fit.
    fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RateError> {
        if from == to {
            return Ok(Some(amount));
        }
        Ok(self.get_rate(from, to, date)?.and_then(|rate| amount.checked_mul(rate)))
    }
}

/// Rate table held in memory. Can be slowed down or switched off to
/// exercise the fallback chain.
#[derive(Debug, Default)]
pub struct InMemoryRates {
    rates: RwLock<HashMap<(Currency, Currency), Vec<(NaiveDate, Decimal)>>>,
    delay: RwLock<Option<Duration>>,
    offline: RwLock<bool>,
}

impl InMemoryRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, from: Currency, to: Currency, date: NaiveDate, rate: Decimal) {
        if let Ok(mut rates) = self.rates.write() {
            let history = rates.entry((from, to)).or_default();
            history.retain(|(d, _)| *d != date);
            history.push((date, rate));
            history.sort_by_key(|(d, _)| *d);
        }
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.delay.write() {
            *d = delay;
        }
    }

    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut o) = self.offline.write() {
            *o = offline;
        }
    }

    fn simulate_latency(&self) -> Result<(), RateError> {
        let delay = self.delay.read().map(|d| *d).unwrap_or(None);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if self.offline.read().map(|o| *o).unwrap_or(false) {
            return Err(RateError::Unavailable("offline".to_string()));
        }
        Ok(())
    }

    fn history(&self, from: Currency, to: Currency) -> Vec<(NaiveDate, Decimal)> {
        self.rates
            .read()
            .ok()
            .and_then(|r| r.get(&(from, to)).cloned())
            .unwrap_or_default()
    }
}

impl RateService for InMemoryRates {
    fn get_rate(&self, from: Currency, to: Currency, date: NaiveDate) -> Result<Option<Decimal>, RateError> {
        self.simulate_latency()?;
        Ok(self
            .history(from, to)
            .into_iter()
            .find(|(d, _)| *d == date)
            .map(|(_, rate)| rate))
    }

    fn latest_rate(&self, from: Currency, to: Currency) -> Result<Option<(NaiveDate, Decimal)>, RateError> {
        self.simulate_latency()?;
        Ok(self.history(from, to).last().copied())
    }
}

/// Which step of the fallback chain produced a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSource {
    /// Already in the reference currency.
    Identity,
    SameDay { rate: Decimal },
    Latest { date: NaiveDate, rate: Decimal },
    /// No rate could be found in time; the amount keeps its currency.
    Unconverted,
}

impl RateSource {
    /// Fallbacks are flagged on the audit stream.
    pub fn is_fallback(&self) -> bool {
        matches!(self, RateSource::Latest { .. } | RateSource::Unconverted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub amount: Decimal,
    pub currency: Currency,
    pub source: RateSource,
}

/// Outcome of one pass through the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRate {
    pub from: Currency,
    pub to: Currency,
    pub date: NaiveDate,
    pub source: RateSource,
}

impl ResolvedRate {
    pub fn applies_to(&self, from: Currency, date: NaiveDate) -> bool {
        self.from == from && self.date == date
    }

    /// Converts `amount`. A product too large for a decimal stays
    /// unconverted.
    pub fn apply(&self, amount: Decimal) -> Conversion {
        let unconverted = Conversion {
            amount,
            currency: self.from,
            source: RateSource::Unconverted,
        };
        let rate = match self.source {
            RateSource::Identity => {
                return Conversion {
                    amount,
                    currency: self.to,
                    source: RateSource::Identity,
                };
            }
            RateSource::SameDay { rate } | RateSource::Latest { rate, .. } => rate,
            RateSource::Unconverted => return unconverted,
        };
        match amount.checked_mul(rate) {
            Some(converted) => Conversion {
                amount: converted,
                currency: self.to,
                source: self.source,
            },
            None => {
                warn!(from = %self.from, to = %self.to, %amount, %rate, "converted amount overflows, left unconverted");
                unconverted
            }
        }
    }
}

/// Time-boxed conversion into the reference currency.
#[derive(Clone)]
pub struct RateLookup {
    service: Arc<dyn RateService>,
    timeout: Duration,
    reference: Currency,
}

impl core::fmt::Debug for RateLookup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RateLookup")
            .field("timeout", &self.timeout)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

impl RateLookup {
    pub fn new(service: Arc<dyn RateService>, timeout: Duration, reference: Currency) -> Self {
        Self {
            service,
            timeout,
            reference,
        }
    }

    pub fn reference(&self) -> Currency {
        self.reference
    }

    /// Runs the fallback chain once for `from` on `date`. The result can be
    /// applied to any number of amounts.
    pub fn resolve(&self, from: Currency, date: NaiveDate) -> ResolvedRate {
        let to = self.reference;
        let resolved = |source| ResolvedRate {
            from,
            to,
            date,
            source,
        };
        if from == to {
            return resolved(RateSource::Identity);
        }

        match self.time_boxed(move |s| s.get_rate(from, to, date)) {
            Ok(Some(rate)) => return resolved(RateSource::SameDay { rate }),
            Ok(None) => warn!(%from, %to, %date, "no same-day rate, trying latest"),
            Err(error) => warn!(%from, %to, %date, %error, "same-day rate lookup failed, trying latest"),
        }

        match self.time_boxed(move |s| s.latest_rate(from, to)) {
            Ok(Some((rate_date, rate))) => {
                warn!(%from, %to, %date, %rate_date, %rate, "converting with latest available rate");
                return resolved(RateSource::Latest { date: rate_date, rate });
            }
            Ok(None) => warn!(%from, %to, "no rate on record"),
            Err(error) => warn!(%from, %to, %error, "latest rate lookup failed"),
        }

        warn!(%from, %to, "costs left unconverted");
        resolved(RateSource::Unconverted)
    }

    pub fn to_reference(&self, amount: Decimal, from: Currency, date: NaiveDate) -> Conversion {
        self.resolve(from, date).apply(amount)
    }

    fn time_boxed<T, F>(&self, lookup: F) -> Result<T, RateError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RateService) -> Result<T, RateError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(lookup(service.as_ref()));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(RateError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(RateError::Unavailable("lookup thread exited".to_string()))
            }
        }
    }
}
