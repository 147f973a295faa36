pub mod history;
pub mod save;
pub mod setup;
pub mod spot;
pub mod ui;
