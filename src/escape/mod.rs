//! Escaping pipeline (C1 + C2): classify, then validate-and-escape.

pub mod lut;
pub mod pool;
pub mod utf8;
pub mod utf16;
