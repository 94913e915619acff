// Application layer: the ledger store and the seams it is built from.

pub mod accounts;
pub mod error;
pub mod service;

pub use accounts::*;
pub use error::*;
pub use service::*;
