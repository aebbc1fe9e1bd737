//! Host side of the event bridge: callback slots, the drain pass and the
//! tokio job scheduler that requests it.

pub mod callbacks;
pub mod dispatcher;
pub mod scheduler;

pub use callbacks::{
    AttrArgs, AttrCall, AttrCallback, CallbackError, CallbackResult, HostCallbacks,
    SignalCallback, invoke_attr_callback, legacy_attr_callback,
};
pub use dispatcher::{DrainReport, drain_once};
pub use scheduler::{JobReceiver, JobScheduler, run_dispatch_loop};
