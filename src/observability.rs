use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatsync.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatsync.client.request_errors");
pub(crate) static CLIENT_UNAUTHORIZED: Counter = Counter::new("chatsync.client.unauthorized");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatsync.client.request_duration_seconds");

pub(crate) static VALIDATION_ERRORS: Counter = Counter::new("chatsync.validate.errors");

pub(crate) static STORE_DISPATCHES: Counter = Counter::new("chatsync.store.dispatches");

pub(crate) static SYNC_CACHE_HITS: Counter = Counter::new("chatsync.sync.cache_hits");
pub(crate) static SYNC_SESSIONS_CREATED: Counter = Counter::new("chatsync.sync.sessions_created");
pub(crate) static SYNC_STALE_LOADS: Counter = Counter::new("chatsync.sync.stale_loads");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UNAUTHORIZED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&VALIDATION_ERRORS);

    collector.register_counter(&STORE_DISPATCHES);

    collector.register_counter(&SYNC_CACHE_HITS);
    collector.register_counter(&SYNC_SESSIONS_CREATED);
    collector.register_counter(&SYNC_STALE_LOADS);
}
