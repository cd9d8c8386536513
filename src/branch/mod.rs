//! Branch resolution and label composition.
//!
//! - `head`: turns HEAD files or structured head objects into a [`BranchRef`]
//! - `label`: composes the terminal session [`Label`]

pub mod head;
pub mod label;

pub use head::{read_head_file, BranchRef, HeadError, HeadState};
pub use label::{short_name_from_head_path, short_name_from_root, Label, LabelBuilder};
