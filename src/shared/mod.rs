pub(crate) mod error;
pub(crate) mod fs;
pub(crate) mod security;
pub(crate) mod time;
