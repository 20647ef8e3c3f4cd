pub mod audit;
pub mod memory;
pub mod push;
pub mod redis;
