#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments,
         clippy::comparison_chain, clippy::manual_range_contains)]

pub mod cm_local;
pub mod cm_math;
pub mod cm_patch;
pub mod cm_load;
pub mod cm_bounds;
pub mod cm_capsule;
pub mod cm_trace;
pub mod cm_public;

#[cfg(test)]
mod testutil;
