//! Adapters implementing the outbound ports.

pub mod directory;
pub mod memory;
pub mod processors;

pub use directory::{
    StaticDirectory, TomlDirectory, CONNECTION_FACTORY, REQUESTS_RECEIVE, REQUESTS_SEND,
    WELL_KNOWN_NAMES,
};
pub use memory::{BrokerStats, InMemoryBroker, InMemorySession, DEFAULT_ENDPOINT};
pub use processors::{
    EchoProcessor, GlossaryTranslator, SimulatedTranslator, TranslationDirection,
    SIMULATED_CHINESE, SIMULATED_ENGLISH,
};
