pub mod arch;
pub mod hash;
pub mod package;

pub use arch::Arch;
pub use hash::Sha256Hash;
pub use package::{PackageName, Version};
