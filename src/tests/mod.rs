//! # End-to-End Lifecycle Tests
//!
//! Drive both feeds through the loopback host the way a watch face would:
//! activate, let sensor samples and timer ticks request renders, deactivate.
