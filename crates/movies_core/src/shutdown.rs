//! Ordered graceful-shutdown hooks (`spec.md` §4.I).

use crate::error::{Result, ServiceError};
use crate::timeout::deadlines;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// One unit of teardown work, e.g. "flush audit log" or "close pool".
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// Named hooks run in registration order under an overall deadline. A
/// hook's failure is logged but never prevents later hooks from running; if
/// the deadline expires mid-sequence, remaining hooks are skipped and the
/// shutdown itself reports a timeout.
pub struct ShutdownRegistry {
    hooks: Mutex<Vec<(String, Box<dyn ShutdownHook>)>>,
}

impl Default for ShutdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub async fn register(&self, name: impl Into<String>, hook: Box<dyn ShutdownHook>) {
        self.hooks.lock().await.push((name.into(), hook));
    }

    /// Runs every hook in registration order under `deadline`. Returns
    /// `Timeout` if the overall deadline expires before every hook has run.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        let hooks = self.hooks.lock().await;
        let run_all = async {
            for (name, hook) in hooks.iter() {
                info!(hook = %name, "running shutdown hook");
                if let Err(err) = hook.run().await {
                    error!(hook = %name, error = %err, "shutdown hook failed");
                }
            }
        };

        match tokio::time::timeout(deadline, run_all).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ServiceError::Timeout { op: "shutdown" }),
        }
    }
}

/// Convenience for the default shutdown deadline from `spec.md` §4.I.
pub async fn graceful_shutdown(registry: &ShutdownRegistry) -> Result<()> {
    registry.shutdown(deadlines::SHUTDOWN).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHook {
        counter: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ShutdownHook for CountingHook {
        async fn run(&self) -> anyhow::Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("forced failure");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn hooks_run_in_order_and_a_failure_does_not_block_later_hooks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ShutdownRegistry::new();
        registry
            .register(
                "first",
                Box::new(CountingHook {
                    counter: counter.clone(),
                    fail: true,
                }),
            )
            .await;
        registry
            .register(
                "second",
                Box::new(CountingHook {
                    counter: counter.clone(),
                    fail: false,
                }),
            )
            .await;

        let result = registry.shutdown(Duration::from_secs(5)).await;
        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_deadline_reports_timeout() {
        struct SlowHook;
        #[async_trait]
        impl ShutdownHook for SlowHook {
            async fn run(&self) -> anyhow::Result<()> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let registry = ShutdownRegistry::new();
        registry.register("slow", Box::new(SlowHook)).await;
        let result = registry.shutdown(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ServiceError::Timeout { op: "shutdown" })));
    }
}
