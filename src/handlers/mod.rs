pub mod health;
pub mod password_reset;
pub mod response;

pub use health::health_check;
pub use password_reset::{
    consume_token_form, consume_token_json, inspect_token, request_reset_form,
    request_reset_json, show_forgot_form,
};
pub use response::{BoundaryResponse, ResponseRouter};
