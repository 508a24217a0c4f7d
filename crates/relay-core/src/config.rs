//! Pipeline configuration knobs.
//!
//! All values carry the defaults named in the design: a dispatch queue
//! of one slot, a two-minute staleness window, and a ~1k actor cache.

use std::time::Duration;

/// Configuration for the relay pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each per-topic event queue between the poll thread
    /// and the decoder loops.
    pub event_queue_size: usize,

    /// Capacity of the dispatch queue between formatting and delivery.
    ///
    /// Kept deliberately small; this is the pipeline's only
    /// backpressure point.
    pub dispatch_queue_size: usize,

    /// Maximum age of a notification event before it is dropped.
    pub staleness_window: Duration,

    /// Maximum number of entries in the actor enrichment cache.
    pub actor_cache_capacity: usize,

    /// Interval between full directory re-snapshots, if any.
    ///
    /// `None` means the directory is only reloaded on demand (startup
    /// and subscription-affecting events).
    pub directory_refresh_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_queue_size: 32,
            dispatch_queue_size: 1,
            staleness_window: Duration::from_secs(120),
            actor_cache_capacity: 1024,
            directory_refresh_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.dispatch_queue_size, 1);
        assert_eq!(cfg.staleness_window, Duration::from_secs(120));
        assert_eq!(cfg.actor_cache_capacity, 1024);
        assert!(cfg.directory_refresh_interval.is_none());
    }
}
