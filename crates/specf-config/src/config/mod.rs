mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use discovery::discover_config_path;
pub use model::{AggressiveConfig, Config, LlmConfig, OutputMode, PlannerBudgets, RunProfile};
pub use sources::ConfigOverrides;
pub use validation::validate;
