pub(crate) mod batch;
pub(crate) mod isrc;
pub(crate) mod playlist;
pub(crate) mod source;
pub(crate) mod spotify;
