//! devup-lib: the action execution engine behind `devup`.
//!
//! This crate turns a project's declared actions into a converged local
//! environment:
//! - `config`: loads the project file into canonical `Action`s
//! - `runtime` / `mapper`: resolve command-line intent and map actions to `Executable`s
//! - `executor`: the per-type handlers (containers, compose, postgres, packages, scripts)
//! - `preflight`: dependency and elevation gates run before anything is dispatched
//! - `engine`: the sequential run controller, with run-once tracking and session logs

pub mod action;
pub mod config;
pub mod consts;
pub mod engine;
pub mod executor;
pub mod idempotency;
pub mod mapper;
pub mod options;
pub mod placeholder;
pub mod platform;
pub mod preflight;
pub mod responder;
pub mod runtime;
pub mod session;
pub mod state;
pub mod util;

pub use config::Project;
pub use engine::{Engine, EngineConfig, EngineError, RunReport};
pub use runtime::{ArgValue, Direction, RawArgs};
