pub mod api_types;
mod cache;
pub mod client;
pub mod request;

pub use client::JiraClient;
