//! Instrumented collaborators (spec §6): interfaces and thin instrumented
//! wrappers for the two external seams a service typically needs logged
//! consistently — a message broker and an HTTP client. Concrete clients are
//! explicitly out of core scope (spec Non-goals); only the seam and the
//! correlation/lifecycle logging around it live here.

pub mod broker;
pub mod http;
