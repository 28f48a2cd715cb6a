mod common;
mod plugin_tests;
