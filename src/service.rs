//! Heartbeat service hosted by the daemon.
//!
//! Reads its interval from the current configuration on every tick, so a
//! reload takes effect without restarting the task.

use std::sync::Arc;

use tokio::time;

use crate::config::ConfigStore;
use crate::lifecycle::ShutdownSignal;

pub struct Heartbeat {
    config: Arc<ConfigStore>,
}

impl Heartbeat {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }

    /// Run until termination is broadcast. Returns the number of beats.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> u64 {
        let mut beats = 0;
        tracing::info!(
            service = %self.config.current().service.name,
            "Heartbeat starting"
        );

        loop {
            let interval = self.config.current().service.heartbeat_interval();
            tokio::select! {
                _ = time::sleep(interval) => {
                    beats += 1;
                    let config = self.config.current();
                    tracing::info!(
                        service = %config.service.name,
                        beats,
                        generation = self.config.generation(),
                        "Heartbeat"
                    );
                }
                reason = shutdown.recv() => {
                    tracing::info!(reason = %reason, beats, "Heartbeat received shutdown signal, exiting loop");
                    break;
                }
            }
        }
        beats
    }
}
