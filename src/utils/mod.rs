pub mod error;
pub mod jwt;
pub mod reference;
pub mod signature;
