//! Call bridge: pairs one telephony media stream with one realtime backend.

mod error;
mod observer;
mod orchestrator;
mod session;

pub use error::BridgeError;
pub use observer::{BridgeEvent, BridgeObserver, Direction, TracingObserver};
pub use orchestrator::Bridge;
pub use session::{CallSession, SessionHandle, SessionState, SessionSummary};
