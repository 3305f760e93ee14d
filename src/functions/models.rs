use serde::{Deserialize, Serialize};

/// An IAM policy as returned by `getIamPolicy` / `setIamPolicy`.
///
/// Use [`PolicyBuilder::from_policy`](super::policy::PolicyBuilder::from_policy) to modify it and
/// write it back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<PolicyBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_configs: Vec<PolicyAuditConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBinding {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expr {
    pub expression: String,
    pub title: String,
    pub description: String,
    pub location: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAuditConfig {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub audit_log_configs: Vec<PolicyAuditLogConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAuditLogConfig {
    #[serde(default)]
    pub log_type: String,
    #[serde(default)]
    pub exempted_members: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestIamPermissionsRequest<'a> {
    pub(crate) permissions: &'a [&'a str],
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TestIamPermissionsResponse {
    #[serde(default)]
    pub(crate) permissions: Vec<String>,
}
