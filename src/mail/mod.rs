//! Outbound message model.
//!
//! # Data Flow
//! ```text
//! caller (to, subject, html, text, attachments)
//!     → message.rs (EmailMessage, stamped with the default sender)
//!     → provider adapter (vendor request shape)
//! ```
//!
//! # Design Decisions
//! - Messages are immutable once built; every attempt sends the same value
//! - Each message gets its own id so retries of one send can be correlated

pub mod message;

pub use message::{Attachment, EmailMessage};
