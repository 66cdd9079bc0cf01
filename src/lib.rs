pub mod error;
pub mod lightning;
pub mod liquid;
pub mod logging;
pub mod swap;
