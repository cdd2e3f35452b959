//! Data model: tenants, clients, sessions, JWT payload, and request-scoped
//! `ClientInfo`.

pub mod client;
pub mod client_info;
pub mod host;
pub mod payload;
pub mod session;
pub mod tenant;

pub use client::Client;
pub use client_info::{ClientInfo, Mode, RequestTuple};
pub use host::HostPattern;
pub use payload::{Payload, ProfileValue};
pub use session::{AuthSession, LoginSession, SessionKind};
pub use tenant::{EntityRef, Tenant};
