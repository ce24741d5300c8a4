//! Link security: levels and the pairing prompt adapter

pub mod level;
pub mod pairing;

pub use level::SecurityLevel;
pub use pairing::{AuthMode, IoCapabilities, PairingAdapter, PairingEvent, PairingReply, PairingState};
