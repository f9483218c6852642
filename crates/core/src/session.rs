use tracing::info;

use crate::registry::NodeRegistry;
use crate::settings::BridgeSettings;
use crate::transport::Transport;

/// Everything scoped to one remote engine session. Passed explicitly into every
/// translator call so several sessions can live side by side.
#[derive(Debug)]
pub struct SessionContext<T: Transport> {
    pub transport: T,
    pub registry: NodeRegistry,
    pub settings: BridgeSettings,
    epoch: u64,
}

impl<T: Transport> SessionContext<T> {
    pub fn new(transport: T, settings: BridgeSettings) -> Self {
        Self {
            transport,
            registry: NodeRegistry::new(),
            settings,
            epoch: 1,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forgets every node of the previous session without issuing any deletes.
    /// Slots notice the new epoch on their next pass and rebuild.
    pub fn reset_session(&mut self) {
        self.registry.invalidate();
        self.epoch += 1;
        info!(epoch = self.epoch, "session reset, registry invalidated");
    }
}
