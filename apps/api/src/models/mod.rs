pub mod catalog;
pub mod transcript;
