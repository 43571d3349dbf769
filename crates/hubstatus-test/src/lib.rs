//! Hubstatus Test - shared test utilities for the gateway client.
//!
//! Provides a scripted [`MockTransport`] that plays the gateway server,
//! frame fixtures, and a [`TestHarness`] that runs a client against it.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! hubstatus-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! #[tokio::test(start_paused = true)]
//! async fn identifies_on_first_request() {
//!     let mut harness = TestHarness::start(Some(TEST_TOKEN.to_string()));
//!     harness.request(Some(HUBS_LABEL));
//!
//!     let mut peer = harness.gateway.accept().await;
//!     let identify = peer.next_frame().await;
//!     assert_eq!(identify["op"], 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
