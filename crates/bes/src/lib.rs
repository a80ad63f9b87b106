//! BES Client - talk to a BES daemon over PPT
//!
//! ```rust,ignore
//! use bes_client::BesClient;
//! use bes_protocol::ConnectSpec;
//!
//! let mut client = BesClient::connect(&ConnectSpec::unix("/tmp/bes.sock")).await?;
//! let response = client.execute("show version;").await?;
//! print!("{}", response.text());
//! client.exit().await?;
//! ```

pub mod client;
pub mod error;

pub use client::{BesClient, Response};
pub use error::{ClientError, Result};
