// Worker process management
pub mod progress_parser;
pub mod python_worker;
pub mod supervisor;

pub use progress_parser::*;
pub use python_worker::*;
pub use supervisor::*;
