//! Personal task timer. Time is tracked per named task and kept in one ledger per calendar day,
//! together with the notes written while working on it.
//!
//! Everything lives in plain JSON files, a single unfinished task survives restarts, and a day
//! can be exported as markdown.

pub mod cli;
pub mod storage;
pub mod tracker;
pub mod utils;
