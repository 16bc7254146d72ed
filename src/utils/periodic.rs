use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// 后台周期任务
///
/// 每隔 `period` 调用一次 `tick`。单次 tick 中的 panic 会被捕获并记录，
/// 下一次 tick 照常执行。`stop` 可重复调用；句柄被丢弃时任务同样结束。
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
}

impl PeriodicTask {
    /// 在当前 tokio 运行时上启动任务，第一次 tick 发生在一个 `period` 之后。
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval 的第一次 tick 立即完成
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(&mut tick)) {
                            tracing::error!(
                                "Panic during {} iteration: {}",
                                name,
                                panic_message(panic.as_ref())
                            );
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("{} stopped", name);
        });

        Self { name, stop_tx }
    }

    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            tracing::debug!("Stopping {}", self.name);
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("test ticker", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        task.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several ticks, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_panic_does_not_kill_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("panicky ticker", Duration::from_millis(10), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first sweep blows up");
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        task.stop();
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let task = PeriodicTask::spawn("idle ticker", Duration::from_secs(60), || {});
        assert!(!task.is_stopped());
        task.stop();
        task.stop();
        assert!(task.is_stopped());
    }
}
