pub mod analyze;
pub mod forecast;
pub mod monte_carlo;
pub mod optimize;
pub mod risk;
pub mod statistics;
