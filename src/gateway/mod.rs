pub(crate) mod api;
pub(crate) mod http;
pub(crate) mod oauth;
