mod context;
pub use context::{AuthenticatedUser, RequestContext, UserRole};

pub mod error;
pub use error::{ErrorResponse, ValidationError, WebError, WebResult};

mod response;
pub use response::ApiResponse;

pub mod dto;
pub mod middlewares;

mod state;
pub use state::AppState;

pub mod routes;

pub mod doc;
