//! Application services: the progression engine and its collaborators.

pub mod command_router;
pub mod environment_materializer;
pub mod progress_renderer;
pub mod progression_engine;
pub mod validation_oracle;

pub use command_router::{parse_command, Command, CommandRouter, Sender};
pub use environment_materializer::EnvironmentMaterializer;
pub use progress_renderer::{ProgressPublisher, ProgressRenderer};
pub use progression_engine::{Origin, ProgressionEngine};
pub use validation_oracle::{CheckOutcome, Evidence, ValidationOracle};
