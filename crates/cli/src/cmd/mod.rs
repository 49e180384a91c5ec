mod build;
mod clean;
mod plan;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use plan::cmd_plan;
