pub mod health;
pub mod shares;

pub use health::health_check;
pub use shares::{get_share, list_shares, put_share};
