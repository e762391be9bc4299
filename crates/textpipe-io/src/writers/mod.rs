//! Row encoders (eager string, pipe producer).

pub mod csv;
