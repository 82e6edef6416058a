//! Privacy-Budget Accountant (C3): a thread-safe `context -> {total,
//! consumed}` map, composed sequentially, that fails closed on a
//! would-be overflow — a rejected `consume` never mutates state.

use crate::error::AnonymizeError;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct BudgetEntry {
    pub total: f64,
    pub consumed: f64,
}

pub struct BudgetAccountant {
    entries: DashMap<String, BudgetEntry>,
}

impl BudgetAccountant {
    pub fn new() -> Self {
        BudgetAccountant {
            entries: DashMap::new(),
        }
    }

    /// Seeds a context with a total epsilon budget, leaving `consumed` at
    /// zero. Re-initializing an existing context resets its consumption.
    pub fn initialize(&self, context: &str, total: f64) {
        self.entries
            .insert(context.to_string(), BudgetEntry { total, consumed: 0.0 });
    }

    /// Updates a context's total budget without disturbing its consumed
    /// amount, for a context whose allowance changes mid-run. Creates the
    /// context (with zero consumed) if it did not already exist.
    pub fn set_total(&self, context: &str, total: f64) {
        self.entries
            .entry(context.to_string())
            .and_modify(|e| e.total = total)
            .or_insert(BudgetEntry { total, consumed: 0.0 });
    }

    pub fn get_consumed(&self, context: &str) -> f64 {
        self.entries.get(context).map(|e| e.consumed).unwrap_or(0.0)
    }

    pub fn get_remaining(&self, context: &str) -> f64 {
        self.entries
            .get(context)
            .map(|e| (e.total - e.consumed).max(0.0))
            .unwrap_or(0.0)
    }

    pub fn reset(&self, context: &str) {
        if let Some(mut entry) = self.entries.get_mut(context) {
            entry.consumed = 0.0;
        }
    }

    /// Attempts to consume `epsilon` from `context`'s budget under
    /// sequential composition. Fails closed: on overflow, no state is
    /// mutated and a `BudgetExhausted` error is returned. `sequential
    /// composition is the only path implemented; `advanced_composition`
    /// requests are honored as sequential with a warning, per the engine's
    /// design notes.
    pub fn consume(
        &self,
        context: &str,
        epsilon: f64,
        advanced_composition: bool,
    ) -> Result<f64, AnonymizeError> {
        if advanced_composition {
            tracing::warn!(
                target: "fhir_anon::budget",
                context,
                "advanced composition requested but not implemented; falling back to sequential composition"
            );
        }

        let mut entry = self.entries.get_mut(context).ok_or_else(|| {
            AnonymizeError::Configuration(format!(
                "privacy budget context '{context}' was never initialized"
            ))
        })?;

        if entry.consumed + epsilon > entry.total {
            return Err(AnonymizeError::BudgetExhausted {
                context: context.to_string(),
                requested: epsilon,
                remaining: (entry.total - entry.consumed).max(0.0),
            });
        }

        entry.consumed += epsilon;
        Ok(entry.total - entry.consumed)
    }
}

impl Default for BudgetAccountant {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_within_budget_succeeds() {
        let acct = BudgetAccountant::new();
        acct.initialize("ctx", 1.0);
        assert!(acct.consume("ctx", 0.4, false).is_ok());
        assert!((acct.get_consumed("ctx") - 0.4).abs() < 1e-9);
    }

    #[test]
    fn overflow_fails_closed() {
        let acct = BudgetAccountant::new();
        acct.initialize("ctx", 1.0);
        acct.consume("ctx", 0.9, false).unwrap();
        let err = acct.consume("ctx", 0.2, false).unwrap_err();
        assert!(matches!(err, AnonymizeError::BudgetExhausted { .. }));
        // state unchanged by the rejected call
        assert!((acct.get_consumed("ctx") - 0.9).abs() < 1e-9);
    }

    #[test]
    fn unknown_context_is_a_configuration_error() {
        let acct = BudgetAccountant::new();
        let err = acct.consume("missing", 0.1, false).unwrap_err();
        assert!(matches!(err, AnonymizeError::Configuration(_)));
    }

    #[test]
    fn set_total_preserves_consumed() {
        let acct = BudgetAccountant::new();
        acct.initialize("ctx", 1.0);
        acct.consume("ctx", 0.6, false).unwrap();
        acct.set_total("ctx", 2.0);
        assert!((acct.get_consumed("ctx") - 0.6).abs() < 1e-9);
        assert!((acct.get_remaining("ctx") - 1.4).abs() < 1e-9);
    }

    #[test]
    fn set_total_on_unknown_context_creates_it() {
        let acct = BudgetAccountant::new();
        acct.set_total("fresh", 3.0);
        assert!((acct.get_remaining("fresh") - 3.0).abs() < 1e-9);
        assert!((acct.get_consumed("fresh")).abs() < 1e-9);
    }
}
