//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep check records, summaries and config structs in one place.
//! - Avoid cyclic imports between the engine (`services/*`) and the scenario catalog (`commands/*`).
//! - Make `--json` summary schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs`: polarity/bucket/record types, run summary, config file structs.
//! - `constants.rs`: stable constants (config lookup, expected tool rejection messages).
//!
//! ## Rule of thumb
//! Domain types should be data-only: no process/filesystem side effects.
//!
//! ## Compatibility note
//! `Summary` is the `--json` output contract; keep it in sync with `docs/contracts/summary.schema.json`.

pub mod constants;
pub mod models;
