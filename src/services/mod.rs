pub mod agent;
pub mod command_agent;
pub mod model_provider;
pub mod resume_fetcher;

pub use agent::{ActionRegistry, AgentCapability, AgentRequest, AgentTranscript};
pub use command_agent::CommandAgent;
pub use model_provider::{Credentials, ModelHandle, ModelProvider};
pub use resume_fetcher::ResumeFetcher;
