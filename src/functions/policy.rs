//! Builders for Identity and Access Management (IAM) policies.
//!
//! A [`PolicyBuilder`] is a collection of [`Binding`]s and [`AuditConfig`]s. A binding binds one
//! or more members to a single role, optionally gated by a condition [`Expression`]. An audit
//! config selects which permission types are logged for a service and which identities are
//! exempted.
//!
//! Adding a binding or an audit config copies its serialized form at the time of the call. The
//! source object can then be mutated (or cleared, see the `clear_after` flag) without affecting
//! what was added.
//!
//! See <https://cloud.google.com/functions/docs/reference/rest/v1/Policy>.
//!
//! # Examples
//!
//! ```rust
//! use firebase_rest_sdk::functions::policy::{Binding, PolicyBuilder};
//!
//! let mut binding = Binding::new();
//! binding.set_role("roles/viewer");
//! binding.add_member("user:alice@example.com");
//!
//! let mut policy = PolicyBuilder::new();
//! policy.add_binding(&mut binding, true);
//!
//! assert_eq!(
//!     policy.serialize(false),
//!     r#"{"bindings":[{"role":"roles/viewer","members":["user:alice@example.com"]}]}"#
//! );
//! ```

use super::models::Policy;
use crate::core::arg::StringArg;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// The permission types for which audit logging can be configured.
///
/// Log types are sent verbatim, so plain strings are accepted as well wherever a log type is
/// expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Unspecified,
    AdminRead,
    DataWrite,
    DataRead,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Unspecified => "LOG_TYPE_UNSPECIFIED",
            LogType::AdminRead => "ADMIN_READ",
            LogType::DataWrite => "DATA_WRITE",
            LogType::DataRead => "DATA_READ",
        }
    }
}

impl StringArg for LogType {
    fn to_arg(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

fn insert_str(map: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn insert_list(map: &mut Map<String, Value>, key: &str, values: &[String]) {
    if !values.is_empty() {
        let values = values.iter().cloned().map(Value::String).collect();
        map.insert(key.to_string(), Value::Array(values));
    }
}

fn insert_array(map: &mut Map<String, Value>, key: &str, values: &[Value]) {
    if !values.is_empty() {
        map.insert(key.to_string(), Value::Array(values.to_vec()));
    }
}

/// The configuration for logging one type of permission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditLogConfig {
    log_type: String,
    exempted_members: Vec<String>,
}

impl AuditLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the permission type to log, e.g. [`LogType::DataRead`] or `"ADMIN_READ"`.
    pub fn set_log_type(&mut self, log_type: impl StringArg) {
        self.log_type = log_type.to_arg().into_owned();
    }

    /// Adds an identity that does not cause logging for this type of permission.
    ///
    /// Follows the same format as [`Binding::add_member`], e.g. `allUsers`.
    pub fn add_exempted_member(&mut self, member: impl StringArg) {
        self.exempted_members.push(member.to_arg().into_owned());
    }

    pub fn clear_exempted_members(&mut self) {
        self.exempted_members.clear();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn log_type(&self) -> &str {
        &self.log_type
    }

    pub fn exempted_members(&self) -> &[String] {
        &self.exempted_members
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut map = Map::new();
        insert_str(&mut map, "logType", &self.log_type);
        insert_list(&mut map, "exemptedMembers", &self.exempted_members);
        Value::Object(map)
    }
}

/// The audit configuration for a service.
///
/// If there are audit configs for both `allServices` and a specific service, the service uses
/// the union of the two: the log types of each config are enabled and the exempted members of
/// each are exempted. That union is applied by the IAM service; this type only accumulates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuditConfig {
    service: String,
    audit_log_configs: Vec<Value>,
}

impl AuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service enabled for audit logging, e.g. `storage.googleapis.com`.
    /// `allServices` is a special value that covers all services.
    pub fn set_service(&mut self, service: impl StringArg) {
        self.service = service.to_arg().into_owned();
    }

    /// Appends a copy of `config`, then resets `config` when `clear_after` is set.
    pub fn add_audit_log_config(&mut self, config: &mut AuditLogConfig, clear_after: bool) {
        self.audit_log_configs.push(config.to_json());
        if clear_after {
            config.clear();
        }
    }

    pub fn clear_audit_log_configs(&mut self) {
        self.audit_log_configs.clear();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn audit_log_configs_len(&self) -> usize {
        self.audit_log_configs.len()
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut map = Map::new();
        insert_str(&mut map, "service", &self.service);
        insert_array(&mut map, "auditLogConfigs", &self.audit_log_configs);
        Value::Object(map)
    }
}

/// A condition in Common Expression Language, attached to a [`Binding`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Expression {
    /// Textual representation of the expression.
    pub expression: String,
    /// Short string describing the purpose of the expression.
    pub title: String,
    /// Longer description of the expression.
    pub description: String,
    /// Location of the expression for error reporting, e.g. a file name and a position.
    pub location: String,
}

impl Expression {
    fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        insert_str(&mut map, "expression", &self.expression);
        insert_str(&mut map, "title", &self.title);
        insert_str(&mut map, "description", &self.description);
        insert_str(&mut map, "location", &self.location);
        map
    }
}

/// Associates members with a role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    role: String,
    members: Vec<String>,
    condition: Option<Expression>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identity requesting access, e.g. `user:alice@example.com`, `group:admins@example.com`,
    /// `serviceAccount:app@appspot.gserviceaccount.com`, `domain:example.com` or `allUsers`.
    ///
    /// Duplicates are kept.
    pub fn add_member(&mut self, member: impl StringArg) {
        self.members.push(member.to_arg().into_owned());
    }

    /// Sets the role assigned to the members, e.g. `roles/viewer`, `roles/editor` or `roles/owner`.
    pub fn set_role(&mut self, role: impl StringArg) {
        self.role = role.to_arg().into_owned();
    }

    /// Replaces the condition of this binding.
    ///
    /// Empty arguments are left out of the serialized condition; a condition with no field set
    /// is left out entirely.
    pub fn set_condition(
        &mut self,
        expression: impl StringArg,
        title: impl StringArg,
        description: impl StringArg,
        location: impl StringArg,
    ) {
        self.condition = Some(Expression {
            expression: expression.to_arg().into_owned(),
            title: title.to_arg().into_owned(),
            description: description.to_arg().into_owned(),
            location: location.to_arg().into_owned(),
        });
    }

    pub fn clear_members(&mut self) {
        self.members.clear();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut map = Map::new();
        insert_str(&mut map, "role", &self.role);
        insert_list(&mut map, "members", &self.members);
        if let Some(condition) = &self.condition {
            let condition = condition.to_json();
            if !condition.is_empty() {
                map.insert("condition".to_string(), Value::Object(condition));
            }
        }
        Value::Object(map)
    }
}

/// An IAM policy under construction.
///
/// The `etag` is used for optimistic concurrency control: take it from the policy returned by
/// `getIamPolicy` and send it back with `setIamPolicy`, so the write is rejected if the policy
/// changed in between.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyBuilder {
    version: Option<i32>,
    etag: Option<String>,
    bindings: Vec<Value>,
    audit_configs: Vec<Value>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a builder from a policy read from the server, keeping its version and etag.
    pub fn from_policy(policy: &Policy) -> Self {
        let mut builder = Self::new();
        if let Some(version) = policy.version {
            builder.set_version(version);
        }
        if let Some(etag) = &policy.etag {
            builder.set_etag(etag);
        }

        let mut binding = Binding::new();
        for b in &policy.bindings {
            binding.set_role(&b.role);
            for member in &b.members {
                binding.add_member(member);
            }
            if let Some(c) = &b.condition {
                binding.set_condition(&c.expression, &c.title, &c.description, &c.location);
            }
            builder.add_binding(&mut binding, true);
        }

        let mut config = AuditConfig::new();
        let mut log_config = AuditLogConfig::new();
        for ac in &policy.audit_configs {
            config.set_service(&ac.service);
            for lc in &ac.audit_log_configs {
                log_config.set_log_type(&lc.log_type);
                for member in &lc.exempted_members {
                    log_config.add_exempted_member(member);
                }
                config.add_audit_log_config(&mut log_config, true);
            }
            builder.add_audit_config(&mut config, true);
        }

        builder
    }

    /// Appends a copy of `config`, then resets `config` when `clear_after` is set.
    pub fn add_audit_config(&mut self, config: &mut AuditConfig, clear_after: bool) {
        self.audit_configs.push(config.to_json());
        if clear_after {
            config.clear();
        }
    }

    pub fn clear_audit_configs(&mut self) {
        self.audit_configs.clear();
    }

    /// Appends a copy of `binding`, then resets `binding` when `clear_after` is set.
    pub fn add_binding(&mut self, binding: &mut Binding, clear_after: bool) {
        self.bindings.push(binding.to_json());
        if clear_after {
            binding.clear();
        }
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    /// Sets the policy format. The service accepts `0`, `1` and `3`; any value is stored here and
    /// invalid ones are rejected by the service. Conditional bindings require version `3`.
    pub fn set_version(&mut self, version: i32) {
        self.version = Some(version);
    }

    /// Sets the etag returned by a previous `getIamPolicy`. The value is opaque.
    pub fn set_etag(&mut self, etag: impl StringArg) {
        self.etag = Some(etag.to_arg().into_owned());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn bindings_len(&self) -> usize {
        self.bindings.len()
    }

    pub fn audit_configs_len(&self) -> usize {
        self.audit_configs.len()
    }

    /// Serializes the policy to JSON. `prettify` only changes whitespace.
    pub fn serialize(&self, prettify: bool) -> String {
        let json = self.to_json();
        if prettify {
            format!("{:#}", json)
        } else {
            json.to_string()
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(version) = self.version {
            map.insert("version".to_string(), Value::from(version));
        }
        if let Some(etag) = &self.etag {
            insert_str(&mut map, "etag", etag);
        }
        insert_array(&mut map, "bindings", &self.bindings);
        insert_array(&mut map, "auditConfigs", &self.audit_configs);
        Value::Object(map)
    }
}
