//! Template rendering — the auditable artifact submitted to the control plane.
//!
//! The configuration graph is rendered into a declarative template with
//! `Parameters` and `Resources` sections. Object keys are emitted in
//! sorted order, so identical graphs render to identical bytes.

use std::path::Path;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use splitstack_core::{Error, LoadBalancerConfig, Result, StackParameters, TargetPool};
use tracing::info;

const LOAD_BALANCER_TYPE: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
const LISTENER_TYPE: &str = "AWS::ElasticLoadBalancingV2::Listener";
const TARGET_GROUP_TYPE: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";

/// A rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    body: String,
}

impl Template {
    /// Render a configuration graph. Fails if the graph violates its
    /// integrity invariants.
    pub fn render(config: &LoadBalancerConfig) -> Result<Self> {
        config.check_integrity()?;

        let mut resources = Map::new();
        resources.insert(config.load_balancer.logical_id.clone(), load_balancer(config));
        resources.insert(config.forwarding_rule.logical_id.clone(), listener(config));
        for pool in &config.target_pools {
            resources.insert(pool.logical_id.clone(), target_group(pool));
        }

        let document = json!({
            "Parameters": parameters(),
            "Resources": resources,
        });
        let body = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::Artifact(e.to_string()))?;
        Ok(Self { body })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Hex SHA-256 of the template body.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.body.as_bytes()))
    }

    /// Persist the template for inspection.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.body)
            .map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), digest = %self.digest(), "template written");
        Ok(())
    }
}

fn parameters() -> Value {
    json!({
        (StackParameters::SECURITY_GROUPS): {
            "Description": "List of security groups",
            "Type": "CommaDelimitedList",
        },
        (StackParameters::SUBNETS): {
            "Description": "List of subnets that your instances reside in",
            "Type": "CommaDelimitedList",
        },
        (StackParameters::VPC_ID): {
            "Description": "VPC ID of all of the instances",
            "Type": "String",
        },
    })
}

fn load_balancer(config: &LoadBalancerConfig) -> Value {
    json!({
        "Type": LOAD_BALANCER_TYPE,
        "Properties": {
            "IpAddressType": "ipv4",
            "Name": config.load_balancer.name,
            "Scheme": "internet-facing",
            "SecurityGroups": { "Ref": StackParameters::SECURITY_GROUPS },
            "Subnets": { "Ref": StackParameters::SUBNETS },
            "Type": "application",
        },
    })
}

fn listener(config: &LoadBalancerConfig) -> Value {
    let rule = &config.forwarding_rule;
    let target_groups: Vec<Value> = rule
        .pools
        .iter()
        .map(|entry| {
            json!({
                "TargetGroupArn": { "Ref": entry.pool_ref },
                "Weight": entry.weight,
            })
        })
        .collect();

    json!({
        "Type": LISTENER_TYPE,
        "Properties": {
            "LoadBalancerArn": { "Ref": rule.load_balancer_ref },
            "Port": rule.port,
            "Protocol": "HTTP",
            "DefaultActions": [{
                "Type": "forward",
                "ForwardConfig": { "TargetGroups": target_groups },
            }],
        },
    })
}

fn target_group(pool: &TargetPool) -> Value {
    let targets: Vec<Value> = pool
        .targets
        .iter()
        .map(|t| json!({ "Id": t.instance_id, "Port": t.port }))
        .collect();

    json!({
        "Type": TARGET_GROUP_TYPE,
        "Properties": {
            "HealthCheckIntervalSeconds": pool.health_check.interval_secs,
            "HealthCheckTimeoutSeconds": pool.health_check.timeout_secs,
            "HealthyThresholdCount": pool.health_check.healthy_threshold,
            "HealthCheckPath": pool.health_check.path,
            "Name": pool.name,
            "Port": pool.port,
            "Protocol": "HTTP",
            "ProtocolVersion": "HTTP1",
            "VpcId": { "Ref": StackParameters::VPC_ID },
            "Targets": targets,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitstack_core::{
        ForwardingRule, HealthCheck, LoadBalancer, Target, WeightedPool, LISTENER_PORT,
        SERVICE_PORT,
    };

    fn pool(label: &str, instances: &[&str]) -> TargetPool {
        TargetPool {
            logical_id: format!("TG{label}prod"),
            name: format!("tg-{label}-prod"),
            version_label: label.to_string(),
            port: SERVICE_PORT,
            health_check: HealthCheck::default(),
            targets: instances
                .iter()
                .map(|id| Target {
                    instance_id: id.to_string(),
                    port: SERVICE_PORT,
                })
                .collect(),
        }
    }

    fn config() -> LoadBalancerConfig {
        LoadBalancerConfig {
            stack_id: "prod".to_string(),
            parameters: StackParameters::default(),
            load_balancer: LoadBalancer {
                logical_id: "ALBprod".to_string(),
                name: "ALBprod".to_string(),
            },
            forwarding_rule: ForwardingRule {
                logical_id: "ALBListenerprod".to_string(),
                load_balancer_ref: "ALBprod".to_string(),
                port: LISTENER_PORT,
                pools: vec![
                    WeightedPool {
                        pool_ref: "TGv1prod".to_string(),
                        weight: 90,
                    },
                    WeightedPool {
                        pool_ref: "TGv2prod".to_string(),
                        weight: 10,
                    },
                ],
            },
            target_pools: vec![pool("v1", &["i-aaa", "i-bbb"]), pool("v2", &[])],
        }
    }

    #[test]
    fn renders_weighted_listener() {
        let template = Template::render(&config()).unwrap();
        let doc: Value = serde_json::from_str(template.body()).unwrap();

        let groups = &doc["Resources"]["ALBListenerprod"]["Properties"]["DefaultActions"][0]
            ["ForwardConfig"]["TargetGroups"];
        assert_eq!(groups[0]["TargetGroupArn"]["Ref"], "TGv1prod");
        assert_eq!(groups[0]["Weight"], 90);
        assert_eq!(groups[1]["TargetGroupArn"]["Ref"], "TGv2prod");
        assert_eq!(groups[1]["Weight"], 10);

        let listener = &doc["Resources"]["ALBListenerprod"]["Properties"];
        assert_eq!(listener["LoadBalancerArn"]["Ref"], "ALBprod");
        assert_eq!(listener["Port"], 80);
    }

    #[test]
    fn renders_target_groups_and_parameters() {
        let template = Template::render(&config()).unwrap();
        let doc: Value = serde_json::from_str(template.body()).unwrap();

        let tg = &doc["Resources"]["TGv1prod"]["Properties"];
        assert_eq!(tg["Name"], "tg-v1-prod");
        assert_eq!(tg["Port"], 8000);
        assert_eq!(tg["HealthCheckPath"], "/healthcheck");
        assert_eq!(tg["HealthCheckTimeoutSeconds"], 4);
        assert_eq!(tg["HealthyThresholdCount"], 2);
        assert_eq!(tg["Targets"][1]["Id"], "i-bbb");
        assert_eq!(tg["VpcId"]["Ref"], "VPCID");

        let empty = &doc["Resources"]["TGv2prod"]["Properties"]["Targets"];
        assert_eq!(empty.as_array().map(Vec::len), Some(0));

        assert_eq!(doc["Parameters"]["Subnets"]["Type"], "CommaDelimitedList");
        assert_eq!(doc["Parameters"]["VPCID"]["Type"], "String");
        assert_eq!(doc["Resources"]["ALBprod"]["Properties"]["Type"], "application");
    }

    #[test]
    fn identical_graphs_render_identically() {
        let a = Template::render(&config()).unwrap();
        let b = Template::render(&config()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn render_rejects_broken_graph() {
        let mut broken = config();
        broken.target_pools.pop();
        assert!(matches!(
            Template::render(&broken),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn write_to_persists_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let template = Template::render(&config()).unwrap();
        template.write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), template.body());
    }

    #[test]
    fn write_to_missing_dir_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("template.json");
        let template = Template::render(&config()).unwrap();
        assert!(matches!(template.write_to(&path), Err(Error::Artifact(_))));
    }
}
