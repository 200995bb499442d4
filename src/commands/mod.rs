pub mod build;
pub mod install;
