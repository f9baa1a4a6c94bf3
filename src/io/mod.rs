pub mod download;
pub mod extract;
