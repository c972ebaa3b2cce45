//! Instrument Resolution Cache
//!
//! Bridges user-entered symbol text to server-assigned contract ids across
//! the asynchronous resolution round trip.

use std::collections::HashMap;

use tracing::debug;

use super::error::{ClientError, Result};
use super::types::{ContractId, RequestId};

#[derive(Debug, Default)]
pub struct InstrumentResolutionCache {
    /// request id -> symbol text awaiting resolution
    pending: HashMap<RequestId, String>,
    /// requested symbol text -> contract id
    by_symbol: HashMap<String, ContractId>,
    /// resolved contract symbol -> requested symbol text
    resolved_to_requested: HashMap<String, String>,
}

impl InstrumentResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_resolution(&mut self, request_id: RequestId, symbol: &str) -> Result<()> {
        if self.pending.contains_key(&request_id) {
            return Err(ClientError::DuplicateRequestId(request_id));
        }
        self.pending.insert(request_id, symbol.to_string());
        debug!("[INSTRUMENTS] Resolving {} (request {})", symbol, request_id);
        Ok(())
    }

    /// Record a successful resolution and return the originally requested text.
    pub fn complete_resolution(
        &mut self,
        request_id: RequestId,
        contract_id: ContractId,
        resolved_symbol: &str,
    ) -> Result<String> {
        let symbol = self
            .pending
            .remove(&request_id)
            .ok_or(ClientError::UnknownRequestId(request_id))?;

        // Idempotent: a second resolution of the same symbol or contract keeps
        // the first pair.
        if !self.by_symbol.contains_key(&symbol) && !self.resolved_to_requested.contains_key(resolved_symbol) {
            self.by_symbol.insert(symbol.clone(), contract_id);
            self.resolved_to_requested.insert(resolved_symbol.to_string(), symbol.clone());
        }
        Ok(symbol)
    }

    pub fn fail_resolution(&mut self, request_id: RequestId) -> Result<String> {
        self.pending
            .remove(&request_id)
            .ok_or(ClientError::UnknownRequestId(request_id))
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Drop the requested symbol / contract id pair. Absent pairs are ignored.
    pub fn unsubscribe(&mut self, contract_id: ContractId) {
        let requested = self
            .by_symbol
            .iter()
            .find(|(_, id)| **id == contract_id)
            .map(|(symbol, _)| symbol.clone());

        if let Some(requested) = requested {
            self.by_symbol.remove(&requested);
            self.resolved_to_requested.retain(|_, r| *r != requested);
            debug!("[INSTRUMENTS] Forgot {} (contract {})", requested, contract_id);
        }
    }

    pub fn lookup(&self, symbol: &str) -> Option<ContractId> {
        self.by_symbol.get(symbol).copied()
    }

    /// Contract id for a resolved (server) contract symbol.
    pub fn lookup_resolved(&self, resolved_symbol: &str) -> Option<ContractId> {
        self.resolved_to_requested
            .get(resolved_symbol)
            .and_then(|requested| self.by_symbol.get(requested))
            .copied()
    }

    pub fn requested_symbol(&self, contract_id: ContractId) -> Option<&str> {
        self.by_symbol
            .iter()
            .find(|(_, id)| **id == contract_id)
            .map(|(symbol, _)| symbol.as_str())
    }

    pub fn resolved_count(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.by_symbol.clear();
        self.resolved_to_requested.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_round_trip() {
        let mut cache = InstrumentResolutionCache::new();
        cache.begin_resolution(1, "CLZ25").unwrap();
        assert!(cache.is_pending(1));

        let symbol = cache.complete_resolution(1, 500, "F.US.CLEZ25").unwrap();
        assert_eq!(symbol, "CLZ25");
        assert!(!cache.is_pending(1));
        assert_eq!(cache.lookup("CLZ25"), Some(500));
        assert_eq!(cache.lookup_resolved("F.US.CLEZ25"), Some(500));
        assert_eq!(cache.requested_symbol(500), Some("CLZ25"));
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let mut cache = InstrumentResolutionCache::new();
        cache.begin_resolution(3, "ESZ25").unwrap();
        assert_eq!(cache.begin_resolution(3, "NQZ25"), Err(ClientError::DuplicateRequestId(3)));
        assert_eq!(cache.complete_resolution(9, 1, "X"), Err(ClientError::UnknownRequestId(9)));
        assert_eq!(cache.fail_resolution(9), Err(ClientError::UnknownRequestId(9)));
    }

    #[test]
    fn test_second_completion_is_idempotent() {
        let mut cache = InstrumentResolutionCache::new();
        cache.begin_resolution(1, "CLZ25").unwrap();
        cache.complete_resolution(1, 500, "F.US.CLEZ25").unwrap();
        cache.begin_resolution(2, "CLZ25").unwrap();
        cache.complete_resolution(2, 500, "F.US.CLEZ25").unwrap();
        assert_eq!(cache.resolved_count(), 1);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn test_fail_returns_requested_text() {
        let mut cache = InstrumentResolutionCache::new();
        cache.begin_resolution(4, "BOGUS").unwrap();
        assert_eq!(cache.fail_resolution(4).unwrap(), "BOGUS");
        assert_eq!(cache.lookup("BOGUS"), None);
    }

    #[test]
    fn test_unsubscribe_removes_pair() {
        let mut cache = InstrumentResolutionCache::new();
        cache.begin_resolution(1, "CLZ25").unwrap();
        cache.complete_resolution(1, 500, "F.US.CLEZ25").unwrap();
        cache.unsubscribe(500);
        cache.unsubscribe(500);
        assert_eq!(cache.lookup("CLZ25"), None);
        assert_eq!(cache.lookup_resolved("F.US.CLEZ25"), None);
    }
}
