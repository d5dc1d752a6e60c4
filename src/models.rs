pub mod enums;
pub mod structs;

pub use enums::*;
pub use structs::*;
