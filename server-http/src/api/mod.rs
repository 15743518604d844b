pub mod requests;
pub mod responses;

pub use requests::{ListSharesQuery, PutShareRequest};
pub use responses::{
    ErrorResponse, GetShareResponse, HealthResponse, ListSharesResponse, PutShareResponse,
    ShareListItem, iso_timestamp,
};
