mod position;
mod request;
mod status;

pub use position::*;
pub use request::*;
pub use status::*;
