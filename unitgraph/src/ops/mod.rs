//! Kernel entry points the units call into.
//!
//! Units only see these slice-level contracts; the implementations are naive
//! host loops and may be swapped for a faster backend without touching units.
mod cpu;

pub use cpu::{add_assign, matmul, matmul_a_bt, matmul_at_b, scale, sum_rows, unary, zip_map};
