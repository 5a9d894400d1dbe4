mod error;
mod functions;
mod traits;
mod types;
mod validation;

pub use error::AuthError;
pub use functions::{
    calculate_expiry, email_to_name, generate_session_id, generate_state, is_session_expired,
};
pub use traits::{ProviderClient, Result, SessionRepository};
pub use types::{AuthFlowState, Session, SessionId};
pub use validation::validate_return_to;
