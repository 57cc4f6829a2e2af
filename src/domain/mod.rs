//! Pure poll domain rules: no I/O, no actors, plain data in and out.
//! Everything here operates on rows the store layer already fetched.

pub mod admission;
pub mod dashboard;
pub mod draft;
pub mod tally;
