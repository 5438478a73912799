use tracing::debug;

/// Receives the plan of each read an adapter is about to run.
pub trait QueryObserver: Send + Sync {
    fn observe(&self, label: &str, statement: &str, plan: &[String]);
}

/// Logs every observed plan at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn observe(&self, label: &str, statement: &str, plan: &[String]) {
        debug!("query plan for {}: {}", label, statement.trim());
        for line in plan {
            debug!("  {}", line);
        }
    }
}
