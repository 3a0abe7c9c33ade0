pub mod cursor;
pub mod delivery;

pub use cursor::*;
pub use delivery::*;
