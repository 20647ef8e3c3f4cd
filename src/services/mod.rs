pub mod audit;
pub mod dispatch;
pub mod health_service;
pub mod registration_service;
pub mod registry;
pub mod validation;
