//! Deterministic resource naming.
//!
//! Every derived name embeds the stack id so two stacks in the same
//! account and region never collide. Logical ids (template keys) must be
//! alphanumeric, so `-` is dropped from them; physical names keep it.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::VersionSpec;

/// Longest load balancer or target group name the control plane accepts.
pub const MAX_PHYSICAL_NAME_LEN: usize = 32;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").expect("valid regex"));

fn alnum(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Logical id of the stack's load balancer.
pub fn load_balancer_id(stack_id: &str) -> String {
    format!("ALB{}", alnum(stack_id))
}

/// Physical name of the stack's load balancer.
pub fn load_balancer_name(stack_id: &str) -> String {
    format!("ALB{stack_id}")
}

/// Logical id of the stack's weighted listener.
pub fn listener_id(stack_id: &str) -> String {
    format!("ALBListener{}", alnum(stack_id))
}

/// Logical id of the target pool for one version.
pub fn target_pool_id(stack_id: &str, label: &str) -> String {
    format!("TG{}{}", alnum(label), alnum(stack_id))
}

/// Physical name of the target pool for one version.
pub fn target_pool_name(stack_id: &str, label: &str) -> String {
    format!("tg-{label}-{stack_id}")
}

/// Check that a stack id or version label only uses `[A-Za-z0-9-]`
/// and does not start or end with `-`.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config(format!("{kind} must not be empty")));
    }
    if !NAME_RE.is_match(name) {
        return Err(Error::config(format!(
            "{kind} {name:?} may only contain ASCII letters, digits and inner hyphens"
        )));
    }
    Ok(())
}

/// Check that a derived physical name fits the control plane's length limit.
pub fn validate_physical_len(name: &str) -> Result<()> {
    if name.len() > MAX_PHYSICAL_NAME_LEN {
        return Err(Error::config(format!(
            "derived resource name {name:?} is {} characters, limit is {MAX_PHYSICAL_NAME_LEN}",
            name.len()
        )));
    }
    Ok(())
}

/// Validate the stack id and version list before any remote call.
///
/// Rejects an empty version list, duplicate labels, labels whose logical
/// ids collide once `-` is dropped, and derived physical names over the
/// length limit.
pub fn validate_versions(stack_id: &str, versions: &[VersionSpec]) -> Result<()> {
    validate_name("stack name", stack_id)?;
    validate_physical_len(&load_balancer_name(stack_id))?;

    if versions.is_empty() {
        return Err(Error::config(format!("stack {stack_id} declares no versions")));
    }

    let mut labels = HashSet::new();
    let mut logical_ids = HashMap::new();
    for version in versions {
        validate_name("version label", &version.label)?;
        if !labels.insert(version.label.as_str()) {
            return Err(Error::config(format!(
                "duplicate version label {:?}",
                version.label
            )));
        }
        let id = target_pool_id(stack_id, &version.label);
        if let Some(other) = logical_ids.insert(id.clone(), version.label.as_str()) {
            return Err(Error::config(format!(
                "version labels {other:?} and {:?} both map to target pool {id}",
                version.label
            )));
        }
        validate_physical_len(&target_pool_name(stack_id, &version.label))?;
    }
    Ok(())
}
