//! Image reference handling
//!
//! Turns user-supplied `name[:tag]` / `name@digest` strings into [`ImageSpec`]
//! values consumed by the registry client.

pub mod reference;

pub use reference::{parse_image_list, ImageSpec, DEFAULT_TAG};
