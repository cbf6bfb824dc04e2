pub mod overrides;
pub mod report;
pub mod setup;
pub mod ui;
