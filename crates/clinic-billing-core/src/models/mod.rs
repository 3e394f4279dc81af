//! Domain models for the clinic billing core.

mod clinical;
mod doctor;
mod patient;
mod payment;
mod visit;
mod voucher;

pub use clinical::*;
pub use doctor::*;
pub use patient::*;
pub use payment::*;
pub use visit::*;
pub use voucher::*;
