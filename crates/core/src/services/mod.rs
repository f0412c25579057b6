pub mod access_service;
pub mod analytics_service;
pub mod import_service;
pub mod issue_service;
pub mod portfolio_service;
pub mod resource_service;
pub mod session_service;
pub mod stock_service;
