//! Provider API client and the HTTP transport it sits on.

pub mod api_client;
pub mod transport;
pub mod types;


pub use api_client::{ApiClient, endpoints, provider_error};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::*;
