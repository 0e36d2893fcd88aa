//! Queue-driven analysis worker (`§4.11`, AMBIENT STACK): loads DXF files,
//! runs the pure `facas-core` pipeline, renders previews via
//! `facas-render`, and publishes results over a message bus. Everything
//! effectful lives here; `facas-core` never performs I/O.

pub mod bus;
pub mod cache;
pub mod config;
pub mod errors;
pub mod load;
pub mod request;
pub mod storage;
pub mod telemetry;
pub mod worker;
