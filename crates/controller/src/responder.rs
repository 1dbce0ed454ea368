//! Automatic bring-up responses
//!
//! Replays the dongle's usual bring-up flow while listening: add an app key
//! once the network is set up, configure each node as it joins, and
//! optionally provision every device that beacons.
//!
//! Commands run on tokio's blocking pool, so the responder must be driven
//! from inside a runtime. Call [`AutoResponder::finish`] before shutting the
//! controller down so no reaction is lost.

use crate::config::ListenSettings;
use crate::issuer::CommandIssuer;
use protocol::{Address, AppKeyIndex, Command, DeviceUuid, EventHandler};
use std::collections::HashSet;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct AutoResponder {
    issuer: CommandIssuer,
    app_idx: AppKeyIndex,
    auto_setup: bool,
    auto_provision: bool,
    requested: HashSet<DeviceUuid>,
    tasks: JoinSet<bool>,
    failures: usize,
}

impl AutoResponder {
    pub fn new(issuer: CommandIssuer, settings: &ListenSettings) -> Self {
        Self {
            issuer,
            app_idx: AppKeyIndex(settings.app_key_index),
            auto_setup: settings.auto_setup,
            auto_provision: settings.auto_provision,
            requested: HashSet::new(),
            tasks: JoinSet::new(),
            failures: 0,
        }
    }

    /// Commands started but not yet reaped
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every started command and return how many failed in total
    pub async fn finish(&mut self) -> usize {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
        self.failures
    }

    /// Issue on the blocking pool; failures are logged, never fatal
    fn issue(&mut self, command: Command) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record(joined);
        }

        let issuer = self.issuer.clone();
        self.tasks.spawn_blocking(move || {
            info!("Auto: {:?}", command);
            match issuer.issue(&command) {
                Ok(()) => true,
                Err(e) => {
                    error!("Automatic {:?} failed: {}", command, e);
                    false
                }
            }
        });
    }

    fn record(&mut self, joined: Result<bool, tokio::task::JoinError>) {
        match joined {
            Ok(true) => {}
            Ok(false) => self.failures += 1,
            Err(e) => {
                warn!("Automatic command task ended abnormally: {}", e);
                self.failures += 1;
            }
        }
    }
}

impl EventHandler for AutoResponder {
    fn on_setup_status(&mut self) {
        if self.auto_setup {
            self.issue(Command::AddKey {
                app_idx: self.app_idx,
            });
        }
    }

    fn on_node_added(&mut self, addr: Address) {
        if self.auto_setup {
            self.issue(Command::ConfigureNode {
                addr,
                app_idx: self.app_idx,
            });
        }
    }

    fn on_unprovisioned_beacon(&mut self, uuid: &DeviceUuid) {
        // Devices beacon repeatedly until provisioned
        if self.auto_provision && self.requested.insert(*uuid) {
            self.issue(Command::Provision { uuid: *uuid });
        }
    }
}
