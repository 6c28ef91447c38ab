//! Highlights Project Model
//!
//! Defines the data contracts for Highlights projects:
//! - **Timestamp:** `HH:MM:SS[.fraction]` parsing at millisecond resolution
//! - **Project:** opening/closing images, clips, background music, output
//!
//! Media paths are kept as written in the document and resolve against
//! the document's directory at render time.

pub mod project;
pub mod timestamp;

pub use project::*;
pub use timestamp::*;
