use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use time::OffsetDateTime;

use crate::{clock::Clock, diagnostics::Diagnostics, QueueDefaults};

pub(crate) struct SharedStateData {
    pub defaults: QueueDefaults,
    pub diagnostics: Diagnostics,
    pub clock: Box<dyn Clock>,
    /// Database time minus local time, in seconds, as of the last skew check.
    pub clock_skew: AtomicI64,
}

impl SharedStateData {
    pub fn now(&self) -> OffsetDateTime {
        let skew = time::Duration::seconds(self.clock_skew.load(Ordering::Relaxed));
        let now = self.clock.now();
        now.checked_add(skew).unwrap_or(now)
    }
}

#[derive(Clone)]
pub(crate) struct SharedState(pub Arc<SharedStateData>);

impl Deref for SharedState {
    type Target = Arc<SharedStateData>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
