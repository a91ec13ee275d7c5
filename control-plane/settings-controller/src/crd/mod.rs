pub mod api_binding;
pub mod settings;
pub mod widget;
