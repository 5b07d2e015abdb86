pub mod error;
pub mod fields;
pub mod inputs;

pub use error::*;
pub use fields::*;
pub use inputs::*;
