pub(crate) mod env_file;
pub(crate) mod settings;
