//! Agent implementation modules
//!
//! - `config`: resolved configuration and per-call option structs
//! - `builder`: fluent builder for agent construction
//! - `runtime`: the `Agent` type and its turn loop

pub mod builder;
pub mod config;
pub mod runtime;

pub use builder::AgentBuilder;
pub use config::{
    AgentConfig, SubAgentOptions, TurnOptions, DEFAULT_MAX_DELEGATION_DEPTH,
    DEFAULT_MAX_ITERATIONS,
};
pub use runtime::{Agent, DelegationListenerHandle};
