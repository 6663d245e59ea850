//! Service layer
//!
//! Services implement the pipeline's components on top of the repositories:
//! the test gate, the image publisher, the task definition mutator and the
//! rollout controller. The log buffer collects the run log.

mod log_buffer;
mod mutator;
mod publisher;
mod rollout;
mod test_gate;

// Re-export traits
pub use log_buffer::LogBufferService;

// Re-export implementations
pub use log_buffer::InMemoryLogBuffer;
pub use mutator::TaskDefinitionMutator;
pub use publisher::ImagePublisher;
pub use rollout::RolloutController;
pub use test_gate::TestGate;
