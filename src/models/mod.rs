pub mod pair;
pub mod session;

// Re-export commonly used types
pub use pair::{PairSnapshot, TokensResponse};
pub use session::{Package, Session};
