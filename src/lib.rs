pub mod api;
pub mod mixer;
