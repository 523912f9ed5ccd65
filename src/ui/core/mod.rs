pub mod alerts;
pub mod history;
