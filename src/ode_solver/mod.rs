pub mod bootstrap;
pub mod builder;
pub mod config;
pub mod explicit;
pub mod history;
pub mod integrator;
pub mod lte;
pub mod residual;
pub mod scheme;
pub mod step_control;
pub mod trapezoid;

#[cfg(test)]
pub mod test_models;
