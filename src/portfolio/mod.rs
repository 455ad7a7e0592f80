pub mod book;
pub mod tracker;
