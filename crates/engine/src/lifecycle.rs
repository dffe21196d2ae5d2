use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{Bars, EngineCommand, EngineState};
use strategy::StrategyRegistry;

/// Cloneable handle passed to other crates (Telegram, bar streams).
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    bars_tx: broadcast::Sender<Bars>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub fn state_handle(&self) -> Arc<RwLock<EngineState>> {
        self.state.clone()
    }

    /// Sender that bar sources publish closed-bar events on.
    pub fn publisher(&self) -> broadcast::Sender<Bars> {
        self.bars_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bars> {
        self.bars_tx.subscribe()
    }
}

/// Owns the strategy registry and is the only task that mutates strategy state.
///
/// Bar events, timers and idle ticks are serialized through one `select!`
/// loop, so callbacks never run concurrently.
pub struct Engine {
    registry: StrategyRegistry,
    idle_interval: Duration,
    state: Arc<RwLock<EngineState>>,
    bars_rx: broadcast::Receiver<Bars>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    pub fn new(registry: StrategyRegistry, idle_interval: Duration) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (bars_tx, bars_rx) = broadcast::channel(1024);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            bars_tx,
        };

        let engine = Engine {
            registry,
            idle_interval,
            state,
            bars_rx,
            command_rx,
        };

        (engine, handle)
    }

    /// Drive the strategies until shutdown. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        *self.state.write().await = EngineState::Running;
        info!(strategies = self.registry.len(), "Engine running");
        self.registry.start_all().await;

        let (timer_tx, mut timer_rx) = mpsc::channel::<usize>(32);
        let timers: Vec<_> = self
            .registry
            .timer_intervals()
            .into_iter()
            .map(|(index, period)| {
                let tx = timer_tx.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // The first tick completes immediately; timers fire after one full period.
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if tx.send(index).await.is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(timer_tx);

        let mut idle = tokio::time::interval(self.idle_interval);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
        idle.tick().await;

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },

                event = self.bars_rx.recv() => match event {
                    Ok(bars) => self.registry.dispatch(&bars).await,
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "Bar receiver lagged"),
                    Err(RecvError::Closed) => {
                        info!("Bar source closed");
                        break;
                    }
                },

                Some(index) = timer_rx.recv() => {
                    debug!(index, "Timer fired");
                    self.registry.fire_timer(index).await;
                }

                _ = idle.tick() => self.registry.idle_all().await,
            }
        }

        for t in timers {
            t.abort();
        }
        self.registry.finish_all().await;
        *self.state.write().await = EngineState::Finished;
        info!("Engine finished");
    }
}
