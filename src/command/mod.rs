//! Command rendering and execution.
//!
//! | Module     | Responsibility                                          |
//! |------------|---------------------------------------------------------|
//! | `template` | `Template` → `RenderedCommand` placeholder substitution |
//! | `executor` | `Executor` trait, `ProcessExecutor`, `run_all`          |
//! | `recipes`  | The git/compose/ssh-keygen templates for each action    |
//!
//! Commands are argument vectors end to end and are spawned without a
//! shell, so values substituted into a placeholder always stay a single
//! argument. The one value a tool does hand to `sh` (git's
//! `core.sshCommand`) uses a `{name:sh}` placeholder and is quoted.

pub mod executor;
pub mod recipes;
pub mod template;

pub use executor::{CommandOutput, Executor, ProcessExecutor, run_all};
pub use template::{RenderedCommand, Template, Tool, Toolchain, Variables, render, render_all};
