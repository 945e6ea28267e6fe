//! Monthly loan disbursement summaries.
//!
//! Raw loan lines are normalized ([`normalize`]), folded into per
//! `(month, network, product)` totals ([`engine`]), and rendered as a sorted
//! report ([`report`]) that is published without clobbering an existing file
//! ([`io`]).

pub mod engine;
pub mod io;
pub mod normalize;
pub mod report;
pub mod types;
