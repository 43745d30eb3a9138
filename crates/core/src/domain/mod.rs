pub mod agreement;
pub mod contact;
pub mod service;
