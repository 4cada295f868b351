pub mod import_run;
pub mod proposal;
pub mod run_cookie;

pub use import_run::*;
pub use proposal::*;
pub use run_cookie::*;
