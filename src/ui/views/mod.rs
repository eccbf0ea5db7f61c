mod main_view;

pub use main_view::{MainView, MainViewModel};
