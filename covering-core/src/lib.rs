pub mod actuator;
pub mod control;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod range;
pub mod settings;
pub mod store;
pub mod timer;
pub mod worker;

pub use actuator::*;
pub use control::*;
pub use error::*;
pub use models::*;
pub use range::map_range;
pub use settings::Settings;
pub use store::*;
pub use timer::*;
pub use worker::*;
