mod bayesian_filter;
mod kalman_filter;
mod rts_smoother;

pub use bayesian_filter::BayesianFilter;
pub use kalman_filter::{filter, predict, update, FilterConfig, FilterResult, KalmanFilter, Update};
pub use rts_smoother::smooth;
