//! The shared dashboard filter.

use routewatch_types::Filter;
use tokio::sync::watch;
use tracing::info;

/// Holds the current filter and notifies subscribers when it changes.
#[derive(Debug)]
pub struct FilterContext {
    tx: watch::Sender<Filter>,
}

impl FilterContext {
    pub fn new(initial: Filter) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Filter {
        self.tx.borrow().clone()
    }

    /// Replace the filter. Returns false, without notifying anyone, when
    /// `filter` equals the current one.
    pub fn set(&self, filter: Filter) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == filter {
                false
            } else {
                *current = filter.clone();
                true
            }
        });
        if changed {
            info!(%filter, "Dashboard filter changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<Filter> {
        self.tx.subscribe()
    }
}

impl Default for FilterContext {
    fn default() -> Self {
        Self::new(Filter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routewatch_types::TimeRange;

    #[test]
    fn identical_filter_is_a_no_op() {
        let context = FilterContext::default();
        let rx = context.subscribe();

        assert!(!context.set(Filter::new(TimeRange::LastHour, "all")));
        assert!(!rx.has_changed().unwrap());

        assert!(context.set(Filter::new(TimeRange::LastDay, "edge-3")));
        assert!(rx.has_changed().unwrap());
        assert_eq!(context.current().router.router_id(), Some("edge-3"));
    }
}
