//! RCT: Roster Coverage Toolkit
//!
//! A CLI for ingesting provider target lists (rosters of NPIs) into a
//! local SQLite store and measuring how much of each list overlaps with
//! an authoritative network of identifiers.

pub mod cli;
pub mod core;
