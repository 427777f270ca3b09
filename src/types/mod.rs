pub mod market;
pub mod pattern;
pub mod run;
pub mod signals;

pub use market::*;
pub use pattern::*;
pub use run::*;
pub use signals::*;
