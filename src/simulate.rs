//! Scripted event loop for trying the monitor out.
//!
//! A [`Scenario`] is a list of steps played on the calling thread, which acts
//! as the GUI thread of a real [`EventLoopMonitor`]. Reports the monitor
//! produces are collected and returned.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use freezewatch_sdk::{
    EventLogger, EventLoopMonitor, ListenerSet, LockInfo, LoggerError, LongEventReport,
    MonitorParameters, ThreadProbe, ThreadRegistry,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::data::duration::deserialize_duration;

/// One thing the simulated GUI thread does.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Handle an event inside `method` (`class.method`) for `duration`.
    Dispatch {
        method: String,
        #[serde(deserialize_with = "deserialize_duration")]
        duration: Duration,
    },
    /// Sleep waiting for events.
    Idle {
        #[serde(deserialize_with = "deserialize_duration")]
        duration: Duration,
    },
    /// Handle an event inside `method` that waits on `lock`, which a worker
    /// thread named `holder` keeps for `duration`.
    Blocked {
        method: String,
        lock: String,
        holder: String,
        #[serde(deserialize_with = "deserialize_duration")]
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    /// How many times the steps are played.
    pub repeat: usize,
    pub steps: Vec<Step>,
    /// Time left for the monitor to deliver the last report before shutdown.
    #[serde(deserialize_with = "deserialize_duration")]
    pub settle: Duration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "editor".to_string(),
            repeat: 1,
            steps: vec![
                Step::Dispatch {
                    method: "app.Editor.keystroke".to_string(),
                    duration: Duration::from_millis(5),
                },
                Step::Dispatch {
                    method: "app.Editor.reflow".to_string(),
                    duration: Duration::from_millis(900),
                },
                Step::Idle {
                    duration: Duration::from_millis(200),
                },
                Step::Blocked {
                    method: "app.Index.query".to_string(),
                    lock: "IndexLock".to_string(),
                    holder: "indexer".to_string(),
                    duration: Duration::from_millis(1_200),
                },
            ],
            settle: Duration::from_millis(300),
        }
    }
}

impl Scenario {
    /// Check every method is a `class.method` pair.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            bail!("scenario '{}' has no steps", self.name);
        }
        for step in &self.steps {
            if let Step::Dispatch { method, .. } | Step::Blocked { method, .. } = step {
                split_method(method)?;
            }
        }
        Ok(())
    }

    /// Play the scenario against a fresh monitor on the calling thread.
    ///
    /// `outputs` receive every report in addition to the returned list.
    pub fn run(
        &self,
        params: MonitorParameters,
        outputs: Vec<Arc<dyn EventLogger>>,
    ) -> Result<Vec<LongEventReport>> {
        self.validate()?;

        let listeners = Arc::new(ListenerSet::new());
        let registry = Arc::new(ThreadRegistry::new());
        let gui = registry.register("main");

        let mut monitor =
            EventLoopMonitor::start(params, listeners.clone(), registry.clone(), gui.id())
                .context("starting monitor")?;

        let (tx, rx) = mpsc::channel();
        monitor.add_logger(Arc::new(move |report: &LongEventReport| {
            tx.send(report.clone()).map_err(|_| LoggerError::Closed)
        }));
        for output in outputs {
            monitor.add_logger(output);
        }

        info!(
            scenario = %self.name,
            steps = self.steps.len(),
            repeat = self.repeat,
            "running scenario"
        );
        {
            let _event_loop = gui.enter("app.EventLoop", "run");
            let player = Player {
                listeners: &listeners,
                registry: &registry,
                gui: &gui,
            };
            for round in 0..self.repeat {
                debug!(round, "scenario round");
                for step in &self.steps {
                    player.play(step)?;
                }
            }
        }

        thread::sleep(self.settle);
        monitor.shutdown().context("stopping monitor")?;

        Ok(rx.try_iter().collect())
    }
}

struct Player<'a> {
    listeners: &'a ListenerSet,
    registry: &'a ThreadRegistry,
    gui: &'a ThreadProbe,
}

impl Player<'_> {
    fn play(&self, step: &Step) -> Result<()> {
        match step {
            Step::Dispatch { method, duration } => {
                let (class, method) = split_method(method)?;
                self.dispatch(|| {
                    let _frame = self.gui.enter(class, method);
                    thread::sleep(*duration);
                    Ok(())
                })
            }
            Step::Idle { duration } => {
                thread::sleep(*duration);
                Ok(())
            }
            Step::Blocked {
                method,
                lock,
                holder,
                duration,
            } => {
                let (class, method) = split_method(method)?;
                let worker = self.registry.register(holder);
                let worker_id = worker.id();
                let hold_for = *duration;
                let lock_name = lock.clone();

                let (ready_tx, ready_rx) = mpsc::channel();
                let handle = thread::Builder::new()
                    .name(holder.clone())
                    .spawn(move || -> Result<()> {
                        let _frame = worker.enter("app.Worker", "run");
                        let _held = worker.hold(LockInfo::new(lock_name));
                        ready_tx
                            .send(())
                            .context("simulation stopped waiting for the lock holder")?;
                        thread::sleep(hold_for);
                        Ok(())
                    })
                    .context("spawning lock holder")?;
                wait_until_held(&ready_rx, holder, lock)?;

                self.dispatch(|| {
                    let _frame = self.gui.enter(class, method);
                    let _waiting = self
                        .gui
                        .wait_for(LockInfo::new(lock.clone()).owned_by(holder.clone(), worker_id));
                    handle
                        .join()
                        .map_err(|_| anyhow::anyhow!("lock holder '{}' panicked", holder))?
                })
            }
        }
    }

    /// Wrap `work` in the hooks a real loop fires around one event.
    fn dispatch(&self, work: impl FnOnce() -> Result<()>) -> Result<()> {
        self.listeners.fire_exit_idle();
        self.listeners.fire_dispatch_begin();
        let result = work();
        self.listeners.fire_dispatch_end();
        self.listeners.fire_enter_idle();
        result
    }
}

/// Block until the holder thread reports it has taken `lock`.
fn wait_until_held(ready: &mpsc::Receiver<()>, holder: &str, lock: &str) -> Result<()> {
    ready
        .recv()
        .with_context(|| format!("lock holder '{}' exited before taking {}", holder, lock))
}

fn split_method(entry: &str) -> Result<(&str, &str)> {
    match entry.rsplit_once('.') {
        Some((class, method)) if !class.is_empty() && !method.is_empty() => Ok((class, method)),
        _ => bail!("invalid method '{}': expected class.method", entry),
    }
}
