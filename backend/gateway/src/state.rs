use std::sync::Arc;

use armdeck_broker::SessionRegistry;
use armdeck_devices::DeviceStreamRegistry;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionRegistry>,
    pub devices: Arc<DeviceStreamRegistry>,
}
