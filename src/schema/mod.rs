//! xAPI record schema
//!
//! This module parses LRS records into statements and exposes the video
//! profile extensions. Fields that may legitimately be absent are returned as
//! `Option`; a missing `result`/`context` container is a typed error.

mod statement;
pub mod video;

pub use statement::*;
pub use video::VideoRecord;
