pub mod exponential_decay;
pub mod exponential_growth;
pub mod oscillator;
