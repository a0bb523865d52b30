//! Lagged linear return forecasts.

pub mod lagged;

pub use lagged::{
    fit_linear_model, forecast_returns, predict_future, prepare_features, train_model,
    ForecastInput, ForecastResult, LaggedFeatures, LinearModel, TrainedModel,
};
