pub mod identifier;
pub mod status;
pub mod summary;
