//! Client configuration.

/// Registration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Longest accepted endpoint name, in characters.
    pub max_endpoint_name_len: usize,
    /// Resource directory path registrations are posted to.
    pub registration_path: String,
    /// Registration lifetime in seconds (`lt`), server default when unset.
    pub lifetime: Option<u32>,
    /// Binding mode (`b`), such as `U` for UDP.
    pub binding: Option<String>,
}

impl ClientConfig {
    /// Default endpoint name bound.
    pub const DEFAULT_MAX_ENDPOINT_NAME_LEN: usize = 10;

    /// Default resource directory path.
    pub const DEFAULT_REGISTRATION_PATH: &'static str = "rd";
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_endpoint_name_len: Self::DEFAULT_MAX_ENDPOINT_NAME_LEN,
            registration_path: Self::DEFAULT_REGISTRATION_PATH.to_owned(),
            lifetime: None,
            binding: None,
        }
    }
}
