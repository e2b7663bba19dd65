pub mod audio;
pub mod bridge;
pub mod realtime;
pub mod telephony;

pub use audio::{AudioEncoding, AudioFrame, StreamResampler, TELEPHONY_SAMPLE_RATE};
pub use bridge::{Bridge, BridgeObserver, CallSession, SessionState, SessionSummary};
pub use realtime::{
    BackendConfig, BaseRealtime, RealtimeError, RealtimeProvider, RealtimeResult,
    WebSocketRealtime, create_realtime_protocol, get_supported_realtime_providers,
};
pub use telephony::{TelephonyError, TelephonyEvent, TelephonyReceiver, TelephonySender};
