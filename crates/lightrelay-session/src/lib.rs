//! Connection sessions for lightrelay.
//!
//! Every transport connection starts unauthenticated. This crate tracks
//! where each connection is in the handshake:
//!
//! ```text
//! connect() ──→ [PendingAuth] ──(correct key)──→ [Authenticated]
//!                    │
//!                    └──(wrong key)──→ AuthFailurePolicy decides
//! ```
//!
//! 1. **Authentication**: checking the key a peer presents ([`Authenticator`])
//! 2. **Session tracking**: who is connected and in which state ([`SessionManager`])
//! 3. **Failure policy**: what to do with a peer that presents the wrong key
//!    ([`AuthFailurePolicy`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← only authenticated connections may host or join
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport Layer (below)  ← provides ConnectionId
//! ```

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{AuthFailurePolicy, Authenticator, SharedKeyAuthenticator};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionState};
