//! Process configuration read from the environment (and `.env`, via [`dotenvy`]).
//!
//! The deserializer below follows the approach of the [`envy`] crate, trimmed to what this
//! service reads: scalars are parsed from their string form and `Vec` fields are split on
//! commas.
//!
//! [`envy`]: https://github.com/softprops/envy

use std::iter::empty;
use std::sync::LazyLock;

use serde::Deserialize;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::{DEFAULT_IRC_PORT, DEFAULT_IRC_SERVER, DEFAULT_SERVICE_NAME, SERVER_PORT};

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Loads (once) and returns the process configuration.
pub async fn env() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

/// Returns a required string variable, failing with [`EnvErr::Missing`] when it is unset.
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = env().await?;
    let value = match var {
        Var::DatabaseUrl => vars.database_url.as_deref(),
        Var::ScoringConfigPath => vars.scoring_config_path.as_deref(),
        Var::IrcNickname => vars.irc_nickname.as_deref(),
        Var::IrcToken => vars.irc_token.as_deref(),
    };

    value
        .filter(|v| !v.is_empty())
        .ok_or(EnvErr::Missing(var.name()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_api_port")]
    pub server_api_port: u16,
    #[serde(default)]
    pub scoring_config_path: Option<String>,
    #[serde(default)]
    pub irc_nickname: Option<String>,
    #[serde(default)]
    pub irc_token: Option<String>,
    #[serde(default)]
    pub irc_channels: Vec<String>,
    #[serde(default = "default_irc_server")]
    pub irc_server: String,
    #[serde(default = "default_irc_port")]
    pub irc_port: u16,
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(from_env::<Env>()?)
    }

    /// IRC is only started when a login, a token and at least one channel are configured.
    pub fn irc_enabled(&self) -> bool {
        self.irc_nickname.is_some() && self.irc_token.is_some() && !self.irc_channels.is_empty()
    }
}

#[inline]
const fn default_api_port() -> u16 {
    SERVER_PORT
}

#[inline]
const fn default_irc_port() -> u16 {
    DEFAULT_IRC_PORT
}

#[inline]
fn default_irc_server() -> String {
    DEFAULT_IRC_SERVER.to_string()
}

#[inline]
fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    DatabaseUrl,
    ScoringConfigPath,
    IrcNickname,
    IrcToken,
}

impl Var {
    pub const fn name(&self) -> &'static str {
        match self {
            Var::DatabaseUrl => "DATABASE_URL",
            Var::ScoringConfigPath => "SCORING_CONFIG_PATH",
            Var::IrcNickname => "IRC_NICKNAME",
            Var::IrcToken => "IRC_TOKEN",
        }
    }
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

// ---
//  Deserializer implementation
// ---

/// A single variable's (name, value); the name is kept for error messages.
struct EnvValue(String, String);

struct EnvKey(String);

struct Pairs<Iter> {
    inner: Iter,
}

impl<Iter: Iterator<Item = (String, String)>> Iterator for Pairs<Iter> {
    type Item = (EnvKey, EnvValue);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, v)| (EnvKey(k.clone()), EnvValue(k, v)))
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for EnvValue {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for EnvKey {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! forward_parsed_values {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.1.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{}: while parsing '{}' (variable: {})",
                        e, self.1, self.0
                    )))
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for EnvValue {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.trim().is_empty() {
            return SeqDeserializer::new(empty::<EnvValue>()).deserialize_seq(visitor);
        }

        let values = self
            .1
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| EnvValue(self.0.clone(), v.to_owned()))
            .collect::<Vec<_>>();

        SeqDeserializer::new(values.into_iter()).deserialize_seq(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_parsed_values! {
        bool => deserialize_bool,
        u8 => deserialize_u8,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
    }

    serde::forward_to_deserialize_any! {
        i8 i16 f32 f64 char str string unit bytes byte_buf map
        unit_struct tuple_struct identifier tuple enum
        ignored_any struct
    }
}

impl<'de> de::Deserializer<'de> for EnvKey {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map newtype_struct
        unit_struct tuple_struct identifier tuple ignored_any
        bool u8 u16 u32 u64 i8 i16 i32 i64 f32 f64 enum struct
    }
}

struct Deserializer<'de, Iter: Iterator<Item = (String, String)>> {
    inner: MapDeserializer<'de, Pairs<Iter>, EnvDeserializeError>,
}

impl<'de, Iter: Iterator<Item = (String, String)>> de::Deserializer<'de>
    for Deserializer<'de, Iter>
{
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 i8 i16 i32 i64
        f32 f64 enum struct
    }
}

pub fn from_env<T>() -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
{
    // a missing .env is fine, the process environment still applies
    _ = dotenvy::dotenv();
    from_iter(std::env::vars())
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    T::deserialize(Deserializer {
        inner: MapDeserializer::new(Pairs {
            inner: iter.into_iter(),
        }),
    })
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),

    #[error("environment variable '{0}' is not set")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable '{0}'")]
    MissingValue(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_empty() {
        let env: Env = from_iter(vars(&[("PATH", "/usr/bin")])).unwrap();

        assert!(env.database_url.is_none());
        assert_eq!(env.server_api_port, SERVER_PORT);
        assert_eq!(env.irc_server, DEFAULT_IRC_SERVER);
        assert_eq!(env.irc_port, DEFAULT_IRC_PORT);
        assert!(env.irc_channels.is_empty());
        assert!(!env.irc_enabled());
    }

    #[test]
    fn test_parses_values_and_lists() {
        let env: Env = from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("SERVER_API_PORT", "8080"),
            ("IRC_NICKNAME", "ledgerbot"),
            ("IRC_TOKEN", "abc"),
            ("IRC_CHANNELS", "cine, series ,,anime"),
        ]))
        .unwrap();

        assert_eq!(env.database_url.as_deref(), Some("postgres://localhost/ledger"));
        assert_eq!(env.server_api_port, 8080);
        assert_eq!(env.irc_channels, vec!["cine", "series", "anime"]);
        assert!(env.irc_enabled());
    }

    #[test]
    fn test_empty_optional_is_none() {
        let env: Env = from_iter(vars(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "")])).unwrap();
        assert!(env.otel_exporter_otlp_endpoint.is_none());
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let res: Result<Env, _> = from_iter(vars(&[("SERVER_API_PORT", "eighty")]));
        assert!(matches!(res, Err(EnvDeserializeError::Custom(msg)) if msg.contains("SERVER_API_PORT")));
    }
}
