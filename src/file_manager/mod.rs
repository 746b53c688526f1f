pub mod json_ops;
pub mod text_lists;

pub use json_ops::*;
pub use text_lists::*;
