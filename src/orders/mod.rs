pub mod activation;
pub mod pricing;
pub mod review;

pub use activation::OrderDesk;
pub use review::ReviewTicket;
