// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Composition of structural variant candidates with the aligned assembly contigs that
//! support them.
//!
//! Contig fragments are joined to padded breakpoint windows of the variants on a sharded
//! interval index, reduced to one record per contig and, where alignments were split into
//! hard clipped pieces, completed by fetching the pieces listed in the `SA` tag.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;
#[macro_use]
extern crate typed_builder;

pub mod cli;
pub mod compose;
pub mod contigs;
pub mod errors;
pub mod intervals;
pub mod io;
pub mod join;
pub mod utils;
pub mod variants;

pub use crate::compose::{ComposeConfig, ComposeStats, ComposedVariant, Composer};
