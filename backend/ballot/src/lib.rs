//! # Ballot
//!
//! Definitions shared by the voting server and the load tester.
//!
//! ## Catalog
//!
//! - Fixed, ordered list of options
//! - Ids are implied by position, starting at 1
//! - Seeded into the database once, never edited afterwards
//!
//! ## Payloads
//!
//! JSON bodies exchanged over HTTP. Field names follow the deployed frontend
//! (`optionId`, `resultados`, `nombre`, `cantidad`), so they are part of the
//! wire contract and should not be renamed.

pub mod payloads;

/// Options seeded into an empty catalog, in id order.
pub const OPTIONS: [&str; 5] = [
    "PRIMER AÑO",
    "SEGUNDO AÑO",
    "TERCER AÑO",
    "CUARTO AÑO",
    "QUINTO AÑO",
];
