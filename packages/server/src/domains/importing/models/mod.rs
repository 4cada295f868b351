pub mod chapter;
pub mod novel;

pub use chapter::*;
pub use novel::*;
