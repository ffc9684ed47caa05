//! `armdeck-runner` — owns one OS subprocess per session.
//!
//! Spawns the wrapped CLI with a constructed argument list, exposes its
//! combined stdout/stderr as a line stream, relays operator input to its
//! stdin, and terminates it with a TERM → grace → KILL escalation. Reading
//! happens on dedicated tasks, so one hung child never stalls another
//! session.

mod runner;

pub use runner::ProcessRunner;
