pub mod clock;
pub mod credential;
pub mod email;
pub mod lifecycle;
pub mod outcome;
pub mod password_reset;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use credential::{Argon2CredentialHasher, CostParams, CredentialHasher};
pub use email::{EmailNotifier, Notifier};
pub use lifecycle::{LifecycleEvent, ResetObserver, TracingObserver};
pub use outcome::{ErrorClass, Outcome, Resolution};
pub use password_reset::{PasswordResetService, ResetPolicy};
pub use token::{RandomTokenCodec, TokenCodec};
