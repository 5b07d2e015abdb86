pub mod backup;
pub mod error;
pub mod secret;
pub mod session;
pub mod workspace;

pub use error::AdminError;
pub use secret::AdminSecret;
pub use session::{AdminSession, AdminState, AdminStatus};
pub use workspace::CalculatorSession;
