//! Terminal output
//!
//! Styled output via `console` and spinners via `indicatif`, with plain
//! fallbacks when stdout is not an interactive terminal (CI, pipes).
//!
//! # Example
//!
//! ```rust,ignore
//! use prebuild::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//! ui::header(&ctx, "console");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Building console...");
//! spinner.stop("Built console");
//!
//! ui::key_value(&ctx, "Directory", "/home/me/.prebuild/packages/console");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    header, key_value, key_value_status, remark, step_error_detail, step_info, step_ok,
    step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
