mod negotiation_state;
mod negotiator;
mod negotiator_handle;

pub use negotiation_state::*;
pub use negotiator::*;
pub use negotiator_handle::*;
