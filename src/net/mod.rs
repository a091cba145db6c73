pub mod console;
pub mod ntp;
pub mod stack;
