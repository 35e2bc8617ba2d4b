pub mod handler;
pub mod parameter_store;
pub mod proxy;

pub use handler::{handle_event, LambdaState};
pub use parameter_store::ParameterStoreSecrets;
pub use proxy::{ProxyRequest, ProxyResponse};
