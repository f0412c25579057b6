pub mod access;
pub mod analytics;
pub mod issue;
pub mod portfolio;
pub mod resource;
pub mod session;
pub mod settings;
pub mod stock;
