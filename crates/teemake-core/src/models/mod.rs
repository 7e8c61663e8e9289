pub mod error;
pub mod mode;
pub mod package_manager;
pub mod task;

pub use error::{CoreError, CoreErrorKind};
pub use mode::GameMode;
pub use package_manager::PackageManagerFamily;
pub use task::{Stage, Task, TaskResult};
