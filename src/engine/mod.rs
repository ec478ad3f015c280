pub mod assembler;
pub mod browse;
pub mod checkout;
pub mod slots;
pub mod tracking;
