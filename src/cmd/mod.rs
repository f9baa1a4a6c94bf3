pub mod check;
pub mod completions;
pub mod hash;
pub mod install;
