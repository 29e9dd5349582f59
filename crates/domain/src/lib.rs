//! # mqthing-domain
//!
//! Pure domain model for devices published as Web of Things descriptions.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Values** (typed scalars and their change-detection rules)
//! - Define **Properties** (observable, optionally writable state)
//! - Define **Actions** (invocable capabilities and their instance lifecycle)
//! - Define **Events** (typed occurrences and their queue entries)
//! - Define **Devices** (aggregates of the above, with registration order)
//! - Build the JSON-LD description documents for all of them
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod device;
pub mod event;
pub mod iot_schema;
pub mod property;
pub mod schema;
pub mod value;
