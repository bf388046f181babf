//! Lock-step synchronisation with an external reference process.
//!
//! - `state`: the exchanged [`ShadowState`] and its [`ShadowFlags`]
//! - `link`: the [`ShadowLink`] rendezvous and its transports
//! - `session`: the [`ShadowSession`] protocol state machine

pub mod link;
pub mod session;
pub mod state;

pub use link::{read_frame, write_frame, MemoryLink, ShadowError, ShadowLink, StreamLink, TcpLink};
pub use session::{Exchange, ShadowSession};
pub use state::{ShadowFlags, ShadowState};
