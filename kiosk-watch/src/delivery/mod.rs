//! Delivery of selected keys to the printer

pub mod pipeline;

pub use pipeline::{DeliveryError, DeliveryStage, Pipeline, is_text_key};
