pub mod chain;
pub mod script;
pub mod tx;
pub mod wallet;
