pub mod address_type;
pub mod amount;
pub mod delegation;
pub mod fee_estimator;
pub mod pipeline;
