pub mod auth_service;
pub mod catalog_service;
pub mod order_service;
pub mod report_service;
