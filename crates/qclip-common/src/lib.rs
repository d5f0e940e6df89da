#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments,
         clippy::comparison_chain, clippy::manual_range_contains)]

pub mod q_shared;
pub mod crc;
pub mod cvar;
pub mod common;
