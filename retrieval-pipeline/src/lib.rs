pub mod agent;
pub mod bootstrap;
pub mod dispatch;
pub mod query_engine;
pub mod response;
pub mod tools;
pub mod vector_store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use agent::{QueryAgent, ReasoningAgent};
pub use bootstrap::{AgentFactory, AgentHandle, AgentState, DefaultAgentFactory};
pub use dispatch::{dispatch_query, extract_query, parse_body, QueryEnvelope};
pub use response::AgentResponse;
