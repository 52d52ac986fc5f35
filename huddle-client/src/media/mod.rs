mod devices;
mod media_stream;
mod peer;
mod webrtc_peer;

pub use devices::*;
pub use media_stream::*;
pub use peer::*;
pub use webrtc_peer::*;
