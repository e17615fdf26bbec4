mod errors;
mod models;
mod runner;
mod turn;


pub use errors::{AgentError, TurnError};
pub use models::{AgentOptions, TurnOutcome};
pub use runner::Agent;
pub use turn::{LoopState, Turn};
