//! Rewrite Passes
//!
//! Each file in this module contains one pass:
//!
//! - `confirm.rs` - `confirm(x)` to `x.confirmed = True`
//! - `resume.rs` - `resume(x)` to `x`

mod confirm;
mod resume;

pub use confirm::{ConfirmRule, CONFIRMED_ATTR};
pub use resume::ResumeRule;
