//! The currently displayed record list.
//!
//! A snapshot is replaced as a whole, never patched. When several queries are in flight,
//! only the response to the most recent one is allowed to replace the snapshot.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::*;
use crate::request::{apply_filter_request, FilterRequest};

/// Identifies one issued query.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct QueryTicket(u64);

/// What happened to the snapshot when a response came back.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum StoreUpdate {
    Replaced { ticket: QueryTicket, records: usize },
    /// A newer query was issued in the meantime: the response was dropped.
    Stale { ticket: QueryTicket },
}

/// Anything that can answer a filter request with records.
pub trait ResponseSource {
    fn fetch(&self, request: &FilterRequest) -> Result<Vec<ResponseRecord>, FetchError>;
}

/// Records already in memory, filtered the way the backend would filter them.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<ResponseRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<ResponseRecord>) -> InMemorySource {
        InMemorySource { records }
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }
}

impl ResponseSource for InMemorySource {
    fn fetch(&self, request: &FilterRequest) -> Result<Vec<ResponseRecord>, FetchError> {
        Ok(apply_filter_request(&self.records, request))
    }
}

#[derive(Debug, Clone)]
pub struct ResponseStore {
    snapshot: Arc<[ResponseRecord]>,
    last_issued: u64,
    applied: Option<QueryTicket>,
}

impl Default for ResponseStore {
    fn default() -> Self {
        ResponseStore::new()
    }
}

impl ResponseStore {
    pub fn new() -> ResponseStore {
        ResponseStore {
            snapshot: Arc::from(Vec::new()),
            last_issued: 0,
            applied: None,
        }
    }

    /// The records currently displayed. Cheap to clone, never modified afterwards.
    pub fn snapshot(&self) -> Arc<[ResponseRecord]> {
        self.snapshot.clone()
    }

    /// The ticket whose response is on display, if any.
    pub fn applied(&self) -> Option<QueryTicket> {
        self.applied
    }

    /// Registers a new query. Any response to an older ticket becomes stale.
    pub fn begin_query(&mut self) -> QueryTicket {
        self.last_issued += 1;
        debug!("begin_query: ticket {:?}", self.last_issued);
        QueryTicket(self.last_issued)
    }

    /// Hands the response of a query to the store.
    ///
    /// A failure for the latest ticket is returned and leaves the snapshot untouched.
    /// Responses and failures for older tickets are dropped.
    pub fn complete(
        &mut self,
        ticket: QueryTicket,
        response: Result<Vec<ResponseRecord>, FetchError>,
    ) -> Result<StoreUpdate, FetchError> {
        if ticket.0 != self.last_issued {
            debug!(
                "complete: dropping response to ticket {:?}, latest is {:?}",
                ticket, self.last_issued
            );
            return Ok(StoreUpdate::Stale { ticket });
        }
        match response {
            Ok(records) => {
                let n = records.len();
                self.snapshot = Arc::from(records);
                self.applied = Some(ticket);
                info!("complete: ticket {:?} replaced the snapshot with {:?} records", ticket, n);
                Ok(StoreUpdate::Replaced { ticket, records: n })
            }
            Err(e) => {
                warn!("complete: ticket {:?} failed, keeping previous data: {}", ticket, e);
                Err(e)
            }
        }
    }

    /// Issues a query against a source and applies its response.
    pub fn load<S: ResponseSource + ?Sized>(
        &mut self,
        source: &S,
        request: &FilterRequest,
    ) -> Result<StoreUpdate, FetchError> {
        let ticket = self.begin_query();
        let response = source.fetch(request);
        self.complete(ticket, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ResponseSource for Failing {
        fn fetch(&self, _request: &FilterRequest) -> Result<Vec<ResponseRecord>, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }
    }

    fn records(n: u64) -> Vec<ResponseRecord> {
        (0..n)
            .map(|i| ResponseRecord::new(i, "SALUD", "q", "Sí"))
            .collect()
    }

    #[test]
    fn load_replaces_the_snapshot() {
        let mut store = ResponseStore::new();
        store
            .load(&InMemorySource::new(records(3)), &FilterRequest::default())
            .unwrap();
        let first = store.snapshot();
        store
            .load(&InMemorySource::new(records(2)), &FilterRequest::default())
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn failure_keeps_previous_data() {
        let mut store = ResponseStore::new();
        store
            .load(&InMemorySource::new(records(3)), &FilterRequest::default())
            .unwrap();
        let applied = store.applied();
        let err = store.load(&Failing, &FilterRequest::default()).unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.applied(), applied);
    }

    #[test]
    fn last_issued_query_wins() {
        let mut store = ResponseStore::new();
        let older = store.begin_query();
        let newer = store.begin_query();
        let res = store.complete(newer, Ok(records(5))).unwrap();
        assert_eq!(
            res,
            StoreUpdate::Replaced {
                ticket: newer,
                records: 5
            }
        );
        // The slow first response arrives last and must not overwrite the newer data.
        let res = store.complete(older, Ok(records(1))).unwrap();
        assert_eq!(res, StoreUpdate::Stale { ticket: older });
        assert_eq!(store.snapshot().len(), 5);
    }

    #[test]
    fn stale_failures_are_ignored() {
        let mut store = ResponseStore::new();
        let older = store.begin_query();
        let _newer = store.begin_query();
        let res = store.complete(older, Err(FetchError::Network("timeout".to_string())));
        assert_eq!(res, Ok(StoreUpdate::Stale { ticket: older }));
    }
}
