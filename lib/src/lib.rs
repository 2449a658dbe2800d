//! Inspect and patch compiled bytecode
//!
//! ### Example
//!
//! Decoding and printing the instructions of a small code unit:
//!
//! ```
//! use codepatch::bytecode::{decode, render_with, LegacyStackEffects, RenderSettings};
//! use codepatch::code::{CodeUnit, Constant};
//!
//! // LOAD_CONST 0; RETURN_VALUE
//! let unit = CodeUnit::builder("<module>", "example.py")
//!     .instructions(vec![100, 0, 0, 83])
//!     .constants(vec![Constant::None])
//!     .build();
//!
//! let instructions: Vec<_> = decode(&unit, &LegacyStackEffects).collect();
//! let settings = RenderSettings {
//!     unit_tags: false,
//!     ..RenderSettings::default()
//! };
//! let listing = render_with(&settings, &instructions, 0, None);
//! assert_eq!(listing.lines().count(), 2);
//! assert!(listing.ends_with("RETURN_VALUE( 83) (-1 +0) "));
//! ```

pub mod bytecode;
pub mod code;
pub mod decl;
mod errors;
pub mod marshal;
pub mod util;

pub use errors::*;
