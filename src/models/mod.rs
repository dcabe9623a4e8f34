pub mod enums;
pub mod job;
pub mod result;

pub use enums::*;
pub use job::*;
pub use result::*;
