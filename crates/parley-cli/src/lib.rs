//! Parley command-line client.
//!
//! A line-oriented frontend for the Parley client: commands and messages are
//! read from stdin, the conversation is written to stdout, and the server is
//! reached over TCP carrying one JSON packet per line.
//!
//! # Commands
//!
//! ```text
//! /select <peer>   open the conversation with <peer>
//! /unread <peer>   fetch messages <peer> sent while you were away
//! /quit            leave
//! <anything else>  send to the open conversation
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod driver;
pub mod error;
pub mod input;
pub mod keys;
pub mod render;
pub mod system_env;

pub use driver::TcpDriver;
pub use error::CliError;
pub use keys::LocalIdentity;
pub use system_env::SystemEnv;
