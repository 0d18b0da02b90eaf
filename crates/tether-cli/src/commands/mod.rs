pub mod eval;
pub mod repl;
pub mod send;
pub mod serve;
pub mod sig;
