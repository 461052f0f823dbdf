pub mod allocator;
pub mod bitset;
pub mod error;
pub mod manager;
