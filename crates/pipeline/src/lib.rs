pub mod batch;
pub mod generator;
pub mod judge;
pub mod llm;
pub mod prompt;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{run_batch, BatchItem};
pub use generator::Generator;
pub use judge::Judge;
pub use llm::{ChatModel, OpenAiChatModel, TransportFailure};
pub use prompt::{assemble, GenerationRequest};
pub use runner::{Pipeline, RetryPolicy, RunEvent, RunState};
