//! robotmq Core
//!
//! This crate contains the protocol-agnostic building blocks:
//! - Transport endpoints (`endpoint`) and socket helpers (`tcp`, `ipc`)
//! - Socket options and reconnect backoff (`options`, `reconnect`)
//! - Broker clock with a resettable start instant (`clock`)
//! - Named shared-memory segments and rings (`shm`)
//! - Error types (`error`)

// The tcp and shm modules need raw fd access and mmap
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
pub mod clock;
pub mod endpoint;
pub mod error;
pub mod options;
pub mod poison;
pub mod reconnect;
pub mod shm;
pub mod tcp;
pub mod timeout;

#[cfg(unix)]
pub mod ipc;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::clock::{steady_clock_us, system_clock_us, Clock};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{Result, RmqError};
    pub use crate::options::SocketOptions;
    pub use crate::poison::PoisonGuard;
    pub use crate::reconnect::ReconnectState;
    pub use crate::shm::{segment_name, SegmentKind, ShmRing, ShmSegment};
    pub use crate::tcp::enable_tcp_nodelay;
}
