mod error;

pub use error::{ErrorKind, ExitCode, TrouveError, TrouveResult};
