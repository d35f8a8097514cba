//! `solapi-client`: Solapi messaging for woodlink notifications.
//!
//! [`SolapiChannel`] implements the core `NotificationChannel` contract:
//! Kakao AlimTalk as the primary transport, plain SMS as the fallback.
//! [`SolapiClient`] is the signed HTTP layer underneath.

pub mod channel;
pub mod client;
pub mod error;
pub mod types;

pub use channel::SolapiChannel;
pub use client::SolapiClient;
pub use error::{Result, SolapiError};
