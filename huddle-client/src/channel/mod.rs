mod signaling_channel;
mod ws_connector;

pub use signaling_channel::*;
pub use ws_connector::*;
