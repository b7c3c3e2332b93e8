//! ---
//! oprov_section: "01-core-functionality"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Shared configuration primitives for the provisioning engine."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_with::{serde_as, DisplayFromStr, DurationSeconds, PickFirst};
use tracing::debug;
use url::Url;

use crate::env::expand_env_with;
use crate::error::ConfigError;

fn default_admin_login() -> String {
    "admin".to_owned()
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_smtp_encryption() -> String {
    "starttls".to_owned()
}

fn default_smtp_sequence() -> i64 {
    10
}

fn default_server_type() -> String {
    "imap".to_owned()
}

fn default_true() -> bool {
    true
}

/// Treat an explicit YAML `null` the same as an absent key.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stringify any YAML scalar the way the platform stores parameter values.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(true) => Ok("True".to_owned()),
        serde_yaml::Value::Bool(false) => Ok("False".to_owned()),
        serde_yaml::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a scalar parameter value, found {other:?}"
        ))),
    }
}

/// Booleans written literally or expanded from a placeholder, in any letter case.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Bool(flag) => Ok(flag),
        serde_yaml::Value::String(raw) => {
            let text = raw.trim();
            if text.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if text.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(D::Error::custom(format!(
                    "expected true or false, found '{raw}'"
                )))
            }
        }
        other => Err(D::Error::custom(format!(
            "expected a boolean, found {other:?}"
        ))),
    }
}

/// Fully resolved desired state for one Odoo instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionConfig {
    /// Connection to the instance.
    #[serde(default, deserialize_with = "nullable")]
    pub odoo: OdooConfig,
    /// Languages to activate.
    #[serde(default, deserialize_with = "nullable")]
    pub instance: InstanceConfig,
    /// Main company metadata; absent means the company phase does nothing.
    #[serde(default)]
    pub company: Option<CompanyConfig>,
    /// System parameters.
    #[serde(default, deserialize_with = "nullable")]
    pub settings: SettingsConfig,
    /// Modules to install.
    #[serde(default, deserialize_with = "nullable")]
    pub modules: ModulesConfig,
    /// Users to create or update, in order.
    #[serde(default, deserialize_with = "nullable")]
    pub users: Vec<UserConfig>,
    /// Outgoing and incoming mail servers.
    #[serde(default, deserialize_with = "nullable")]
    pub mail: MailConfig,
}

impl ProvisionConfig {
    /// Load, expand and validate the document at `path` using the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Same as [`ProvisionConfig::load`] with an explicit variable lookup.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        debug!(config_path = %path.display(), "loading provisioning configuration");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, lookup, path)
    }

    fn parse<F>(contents: &str, lookup: F, path: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let raw: serde_yaml::Value = serde_yaml::from_str(contents).map_err(parse_error)?;
        // An empty document is an empty mapping, not an error.
        let raw = match raw {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
            other => other,
        };
        let expanded = expand_env_with(raw, lookup)?;
        let config: ProvisionConfig = serde_yaml::from_value(expanded).map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the keys the engine cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if blank(&self.odoo.base_url) {
            missing.push("odoo.base_url".to_owned());
        }
        if blank(&self.odoo.db) {
            missing.push("odoo.db".to_owned());
        }
        if blank(&self.odoo.admin_password) {
            missing.push("odoo.admin_password".to_owned());
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }
        if self.odoo.rpc.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "odoo.rpc.max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        self.credentials().map(|_| ())
    }

    /// Connection credentials derived from the `odoo` section.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let required = |value: &Option<String>, key: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingKeys(vec![key.to_owned()]))
        };
        let raw_url = required(&self.odoo.base_url, "odoo.base_url")?;
        let base_url = Url::parse(raw_url.trim()).map_err(|err| ConfigError::Invalid {
            key: "odoo.base_url".into(),
            message: err.to_string(),
        })?;
        Ok(Credentials {
            base_url,
            db: required(&self.odoo.db, "odoo.db")?,
            login: self.odoo.admin_login.clone(),
            secret: required(&self.odoo.admin_password, "odoo.admin_password")?,
        })
    }
}

impl std::str::FromStr for ProvisionConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::parse(
            content,
            |name| std::env::var(name).ok(),
            Path::new("<inline>"),
        )
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Administrative login material for the remote instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Server root; the RPC endpoint is derived from it.
    pub base_url: Url,
    /// Database name.
    pub db: String,
    /// Administrative login.
    pub login: String,
    /// Administrative password. Never logged.
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url.as_str())
            .field("db", &self.db)
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The `odoo` section: where and as whom to connect.
#[derive(Debug, Clone, Deserialize)]
pub struct OdooConfig {
    /// Server root URL. Required.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Database name. Required.
    #[serde(default)]
    pub db: Option<String>,
    /// Administrative login, `admin` by default.
    #[serde(default = "default_admin_login")]
    pub admin_login: String,
    /// Administrative password. Required.
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Transport security switches.
    #[serde(default, deserialize_with = "nullable")]
    pub tls: TlsConfig,
    /// Timeout and retry settings.
    #[serde(default, deserialize_with = "nullable")]
    pub rpc: RpcConfig,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            db: None,
            admin_login: default_admin_login(),
            admin_password: None,
            tls: TlsConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

/// Transport security switches. Skipping certificate verification must be
/// requested explicitly; it removes transport authenticity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Skip certificate verification. Off unless set.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub accept_invalid_certs: bool,
}

/// Per-call timeout and retry policy.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Per-request timeout (`timeout_secs`, 300 by default).
    #[serde(rename = "timeout_secs", default = "default_timeout")]
    #[serde_as(as = "PickFirst<(DurationSeconds<u64>, DurationSeconds<String>)>")]
    pub timeout: Duration,
    /// Attempts per call for transient failures, 3 by default.
    #[serde(default = "default_max_attempts")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub max_attempts: u32,
    /// Pause between attempts (`retry_delay_secs`, 5 by default).
    #[serde(rename = "retry_delay_secs", default = "default_retry_delay")]
    #[serde_as(as = "PickFirst<(DurationSeconds<u64>, DurationSeconds<String>)>")]
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// The `instance` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceConfig {
    /// Language code also set as the default partner language.
    #[serde(default)]
    pub main_lang: Option<String>,
    /// Further language codes to activate.
    #[serde(default, deserialize_with = "nullable")]
    pub extra_langs: Vec<String>,
}

impl InstanceConfig {
    /// Main language first, then extras, without blanks or repeats.
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = Vec::new();
        for code in self.main_lang.iter().chain(self.extra_langs.iter()) {
            let code = code.trim();
            if !code.is_empty() && !langs.contains(&code) {
                langs.push(code);
            }
        }
        langs
    }

    /// Trimmed main language, when one is declared.
    pub fn main_lang(&self) -> Option<&str> {
        self.main_lang
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Main company fields. Only declared fields are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyConfig {
    /// Company name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tax identifier.
    #[serde(default)]
    pub vat: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Public website.
    #[serde(default)]
    pub website: Option<String>,
    /// Street line.
    #[serde(default)]
    pub street: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub zip: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// ISO country code, resolved to a country record.
    #[serde(default)]
    pub country_code: Option<String>,
    /// State name or code within the country.
    #[serde(default)]
    pub state: Option<String>,
}

/// The `settings` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsConfig {
    /// System parameters to upsert by key.
    #[serde(default, deserialize_with = "nullable")]
    pub ir_config_parameter: Vec<ConfigParameter>,
}

/// One system parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigParameter {
    /// Parameter key.
    pub key: String,
    /// Value as stored by the platform; YAML booleans become `True`/`False`.
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

/// The `modules` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModulesConfig {
    /// Technical names of modules that must be installed.
    #[serde(default, deserialize_with = "nullable")]
    pub install: Vec<String>,
}

/// One declared user, matched by login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserConfig {
    /// Login; entries without one are skipped.
    #[serde(default)]
    pub login: Option<String>,
    /// Display name, defaults to the login.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Preferred language code.
    #[serde(default)]
    pub lang: Option<String>,
    /// Password; only written when present.
    #[serde(default)]
    pub password: Option<String>,
    /// Group references (`module.xml_id` or display name).
    #[serde(default, deserialize_with = "nullable")]
    pub groups: Vec<String>,
}

/// The `mail` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    /// Outgoing server, upserted by name.
    #[serde(default)]
    pub outgoing_smtp: Option<SmtpConfig>,
    /// Incoming server, upserted by name.
    #[serde(default)]
    pub incoming_imap: Option<ImapConfig>,
}

/// Outgoing mail server.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Server name, the natural key.
    pub name: String,
    /// SMTP host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub smtp_port: u16,
    /// `none`, `starttls` (default) or `ssl`.
    #[serde(default = "default_smtp_encryption")]
    pub smtp_encryption: String,
    /// Authentication user.
    #[serde(default)]
    pub smtp_user: Option<String>,
    /// Authentication password.
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// Sender filter.
    #[serde(default)]
    pub from_filter: Option<String>,
    /// Priority among outgoing servers, 10 by default.
    #[serde(default = "default_smtp_sequence")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub sequence: i64,
}

/// Incoming mail server.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ImapConfig {
    /// Server name, the natural key.
    pub name: String,
    /// Fetch protocol, `imap` by default.
    #[serde(default = "default_server_type")]
    pub server_type: String,
    /// Server host.
    pub server_host: String,
    /// Server port.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub server_port: u16,
    /// Use an SSL connection, on by default.
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub is_ssl: bool,
    /// Mailbox user.
    #[serde(default)]
    pub user: Option<String>,
    /// Mailbox password.
    #[serde(default)]
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
odoo:
  base_url: "https://erp.example.com"
  db: "acme"
  admin_password: "${ODOO_ADMIN_PASSWORD}"
  rpc:
    timeout_secs: 60
    retry_delay_secs: "2"
instance:
  main_lang: es_ES
  extra_langs: [en_US, es_ES]
company:
  name: ACME S.L.
  country_code: ES
  state: Madrid
settings:
  ir_config_parameter:
    - key: web.base.url
      value: https://erp.example.com
    - key: auth_signup.allow_uninvited
      value: true
    - key: database.expiration_days
      value: 30
modules:
  install: [sale, crm]
users:
  - login: alice
    groups: [base.group_user]
mail:
  outgoing_smtp:
    name: Primary SMTP
    smtp_host: smtp.example.com
    smtp_port: "${SMTP_PORT}"
  incoming_imap:
    name: Inbox
    server_host: imap.example.com
    server_port: 993
    is_ssl: "false"
"#;

    fn env(name: &str) -> Option<String> {
        match name {
            "ODOO_ADMIN_PASSWORD" => Some("hunter2".into()),
            "SMTP_PORT" => Some("587".into()),
            _ => None,
        }
    }

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_full_document_with_lenient_scalars() {
        let file = write_temp(FULL);
        let config = ProvisionConfig::load_with(file.path(), env).unwrap();

        assert_eq!(config.odoo.admin_login, "admin");
        assert_eq!(config.odoo.rpc.timeout, Duration::from_secs(60));
        assert_eq!(config.odoo.rpc.retry_delay, Duration::from_secs(2));
        assert_eq!(config.odoo.rpc.max_attempts, 3);
        assert!(!config.odoo.tls.accept_invalid_certs);
        assert_eq!(config.instance.languages(), vec!["es_ES", "en_US"]);

        let params = &config.settings.ir_config_parameter;
        assert_eq!(params[1].value, "True");
        assert_eq!(params[2].value, "30");

        let smtp = config.mail.outgoing_smtp.as_ref().unwrap();
        assert_eq!(smtp.smtp_port, 587);
        assert_eq!(smtp.smtp_encryption, "starttls");
        assert_eq!(smtp.sequence, 10);

        let imap = config.mail.incoming_imap.as_ref().unwrap();
        assert_eq!(imap.server_type, "imap");
        assert!(!imap.is_ssl);

        let creds = config.credentials().unwrap();
        assert_eq!(creds.secret, "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ProvisionConfig::load_with("/definitely/not/here.yaml", env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn unresolved_placeholder_fails_load() {
        let file = write_temp(FULL);
        let err = ProvisionConfig::load_with(file.path(), |_| None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnresolvedPlaceholder { ref var, .. } if var == "ODOO_ADMIN_PASSWORD"
        ));
    }

    #[test]
    fn required_keys_are_listed() {
        let file = write_temp("odoo:\n  base_url: https://erp.example.com\n");
        let err = ProvisionConfig::load_with(file.path(), env).unwrap_err();
        match err {
            ConfigError::MissingKeys(keys) => {
                assert_eq!(keys, vec!["odoo.db", "odoo.admin_password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_sections_default_to_empty() {
        let file = write_temp(
            "odoo:\n  base_url: https://x.example\n  db: d\n  admin_password: p\nsettings:\nusers:\nmodules:\n  install:\n",
        );
        let config = ProvisionConfig::load_with(file.path(), env).unwrap();
        assert!(config.users.is_empty());
        assert!(config.modules.install.is_empty());
        assert!(config.settings.ir_config_parameter.is_empty());
        assert!(config.company.is_none());
    }

    #[test]
    fn booleans_from_placeholders_ignore_case() {
        let file = write_temp(
            "odoo:\n  base_url: https://x.example\n  db: d\n  admin_password: p\n  tls:\n    accept_invalid_certs: ${INSECURE}\nmail:\n  incoming_imap:\n    name: Inbox\n    server_host: imap.example.com\n    server_port: 993\n    is_ssl: ${IMAP_SSL}\n",
        );
        let lookup = |ssl: &'static str| {
            move |name: &str| match name {
                "INSECURE" => Some("TRUE".to_owned()),
                "IMAP_SSL" => Some(ssl.to_owned()),
                _ => None,
            }
        };

        let config = ProvisionConfig::load_with(file.path(), lookup("False")).unwrap();
        assert!(config.odoo.tls.accept_invalid_certs);
        assert!(!config.mail.incoming_imap.as_ref().unwrap().is_ssl);

        let config = ProvisionConfig::load_with(file.path(), lookup(" True ")).unwrap();
        assert!(config.mail.incoming_imap.as_ref().unwrap().is_ssl);

        let err = ProvisionConfig::load_with(file.path(), lookup("maybe")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let file = write_temp("odoo:\n  base_url: not a url\n  db: d\n  admin_password: p\n");
        let err = ProvisionConfig::load_with(file.path(), env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "odoo.base_url"));
    }
}
