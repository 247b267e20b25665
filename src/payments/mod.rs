pub mod error;
pub mod mpesa;
pub mod provider;
pub mod types;
pub mod utils;
