//! Outbound notifications for the Autobids portal.
//!
//! - [`delivery`]: SMTP email delivery to the configured portal recipients.
//! - [`messages`]: subject and body builders for every email the portal
//!   sends.

pub mod delivery;
pub mod messages;

pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use messages::EmailMessage;
