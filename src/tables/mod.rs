pub mod dead_nonce;
pub mod fib;
pub mod pit;
pub mod tree;
