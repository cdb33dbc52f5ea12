pub mod error;

pub mod fees;
pub mod pool;
pub mod sign;
pub mod time;
pub mod validate;
