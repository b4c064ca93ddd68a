pub mod core;
pub mod indices;
pub mod item;
pub mod parser;
