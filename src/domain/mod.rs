pub mod audit;
pub mod notification;
pub mod registration;
