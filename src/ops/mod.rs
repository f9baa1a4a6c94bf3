//! Package operations: the install pipeline and its error taxonomy.

pub mod error;
pub mod flow;
pub mod install;

pub use error::{InstallError, InstallFailure};
pub use flow::InstallRequest;
pub use install::{InstallOptions, InstallOutcome, install_package, install_packages};
