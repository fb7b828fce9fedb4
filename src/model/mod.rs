pub mod task;
pub mod project;
pub mod state;
pub mod seed;
pub mod config;

pub use task::*;
pub use project::*;
pub use state::*;
pub use seed::*;
pub use config::*;
