pub use huddle_core::{CallError, ParticipantId, RoomId, SignalMessage};

pub mod model {
    pub use huddle_core::model::*;
    pub use huddle_core::{Connector, Link};
}

#[cfg(feature = "server")]
pub mod server {
    pub use huddle_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use huddle_client::*;
}
