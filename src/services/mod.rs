//! Service layer: the test-orchestration engine and its side-effect helpers.
//!
//! ## Service map
//! - `invoker.rs`: runs the external tool, decodes output into a tagged `Outcome`.
//! - `payload.rs`: decoded payloads, field-path extraction.
//! - `classifier.rs`: polarity truth table, expected-failure matching.
//! - `poller.rs`: poll-until-ready with an injectable `Clock`.
//! - `ledger.rs`: per-run result buckets and exit status.
//! - `runner.rs`: gate, invoke, classify, record.
//! - `fixtures.rs`: generated names and fixture rotation.
//! - `settings.rs`: config file loading and flag/env resolution.
//! - `telemetry.rs`: tracing subscriber setup.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep scenario code thin; delegate to the runner.

pub mod classifier;
pub mod fixtures;
pub mod invoker;
pub mod ledger;
pub mod output;
pub mod payload;
pub mod poller;
pub mod runner;
pub mod settings;
pub mod telemetry;
