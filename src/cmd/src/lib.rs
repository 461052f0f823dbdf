pub mod cmd;
pub mod controller;
pub mod quota;
