use super::{ConfigError, ZerverConfig};

/// Metadata about a single configuration property.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Relative key (e.g., `"pool_size"`).
    pub key: String,
    /// Absolute key (e.g., `"app.database.pool_size"`).
    pub full_key: String,
    /// Rust type name (e.g., `"i64"`).
    pub type_name: &'static str,
    /// Whether the property is required (no default and not `Option`).
    pub required: bool,
    /// Default value as a string, if any.
    pub default_value: Option<String>,
    /// Description from doc comments.
    pub description: Option<String>,
    /// Whether this entry is a nested section rather than a leaf value.
    pub is_section: bool,
    /// Explicit environment variable override, if different from the
    /// upper-cased, dot-to-underscore convention.
    pub env_var: Option<String>,
}

/// Trait for strongly-typed configuration sections.
///
/// Implement by hand for each config struct:
///
/// ```ignore
/// pub struct DatabaseConfig {
///     pub url: String,
///     pub pool_size: i64,
///     pub timeout: Option<i64>,
/// }
///
/// impl ConfigProperties for DatabaseConfig {
///     fn prefix() -> &'static str { "app.database" }
///
///     fn properties_metadata() -> Vec<PropertyMeta> {
///         vec![/* ... */]
///     }
///
///     fn from_config(config: &ZerverConfig) -> Result<Self, ConfigError> {
///         Ok(Self {
///             url: config.get(&format!("{}.url", Self::prefix()))?,
///             pool_size: config.get_or(&format!("{}.pool_size", Self::prefix()), 10),
///             timeout: config.get(&format!("{}.timeout", Self::prefix())).ok(),
///         })
///     }
/// }
/// ```
pub trait ConfigProperties: Sized {
    /// The configuration key prefix (e.g., `"app.database"`).
    fn prefix() -> &'static str;

    /// Metadata about all expected properties.
    fn properties_metadata() -> Vec<PropertyMeta>;

    /// Construct from an `ZerverConfig` instance.
    fn from_config(config: &ZerverConfig) -> Result<Self, ConfigError>;
}
