//! Network role, settings, security and signal tracking.

pub mod security;
pub mod signals;
pub mod state;

pub use security::{InstallCode, NETWORK_KEY_LEN, NetworkKey, SecurityConfig};
pub use signals::{CommissioningMode, Signal, SignalParams, signal_name};
pub use state::{NetworkRuntime, NetworkSettings, NetworkTracker, Role};
