pub mod dates;
pub mod project_ops;
pub mod task_ops;
pub mod validation;
