pub mod call_helpers;
pub mod recording_sink;

pub use call_helpers::*;
pub use mock_peer::*;
pub use recording_sink::*;
pub use spy_connector::*;
