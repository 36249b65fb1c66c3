pub mod bot;
pub mod import;
