use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process request sequence with a random seed, so ids differ across
/// restarts without a syscall per request.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub(crate) fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        uuid::Uuid::from_u128(self.seed ^ u128::from(request_seq))
    }

    /// Stream message id: `msg_` followed by the low 64 bits of the request uuid.
    #[must_use]
    pub(crate) fn message_id(&self, request_seq: u64) -> String {
        let (_, low) = self.request_uuid(request_seq).as_u64_pair();
        crate::util::format_request_seq_hex("msg_", low)
    }
}
