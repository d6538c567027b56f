pub mod delayed_controller;
pub mod webhook_controller;
