//! Core of the share service: the share model, expiry policy, the
//! `ShareStore` port every persistence backend implements, and the
//! background sweeper.

pub mod clock;
pub mod domain;
pub mod ports;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::response::PutResponse;
pub use domain::{RetentionPolicy, Share, ShareSummary, StorageKind, StoreSettings};
pub use ports::{ShareStore, StorageFactory};
pub use sweeper::Sweeper;
