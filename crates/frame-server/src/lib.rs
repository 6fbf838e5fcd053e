//! Frame Server
//!
//! Consumer side of the sample path: answers `'R'` requests on the host
//! link with one checksummed frame of unsent samples.

mod dispatcher;
mod encoder;

pub use dispatcher::{DispatcherState, RequestDispatcher};
pub use encoder::{EncodedFrame, FrameEncoder};
