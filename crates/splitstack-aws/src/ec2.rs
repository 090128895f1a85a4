//! EC2-backed instance directory.

use aws_config::SdkConfig;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::Client;
use splitstack_core::{Error, Result};
use splitstack_planner::{DiscoverFuture, InstanceDirectory};
use tracing::debug;

/// Finds running instances whose `tag_key` tag holds one of the requested
/// cluster ids.
#[derive(Debug, Clone)]
pub struct Ec2Directory {
    sdk: SdkConfig,
    tag_key: String,
}

impl Ec2Directory {
    pub fn new(sdk: SdkConfig, tag_key: &str) -> Self {
        Self {
            sdk,
            tag_key: tag_key.to_string(),
        }
    }

    pub fn tag_key(&self) -> &str {
        &self.tag_key
    }

    fn client(&self, region: &str) -> Client {
        let config = aws_sdk_ec2::config::Builder::from(&self.sdk)
            .region(Region::new(region.to_string()))
            .build();
        Client::from_conf(config)
    }

    async fn running_instances(&self, region: &str, clusters: &[String]) -> Result<Vec<String>> {
        if clusters.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.client(region);
        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client
                .describe_instances()
                .filters(tag_filter(&self.tag_key, clusters))
                .filters(running_filter())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| Error::discovery(region, clusters, DisplayErrorContext(&e)))?;

            for reservation in output.reservations() {
                ids.extend(
                    reservation
                        .instances()
                        .iter()
                        .filter_map(|i| i.instance_id())
                        .map(str::to_string),
                );
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(region, ?clusters, found = ids.len(), "described instances");
        Ok(ids)
    }
}

impl InstanceDirectory for Ec2Directory {
    fn discover<'a>(&'a self, region: &'a str, clusters: &'a [String]) -> DiscoverFuture<'a> {
        Box::pin(self.running_instances(region, clusters))
    }
}

fn tag_filter(tag_key: &str, clusters: &[String]) -> Filter {
    Filter::builder()
        .name(format!("tag:{tag_key}"))
        .set_values(Some(clusters.to_vec()))
        .build()
}

fn running_filter() -> Filter {
    Filter::builder()
        .name("instance-state-name")
        .values("running")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_filter_matches_any_cluster() {
        let clusters = vec!["ses_a".to_string(), "ses_b".to_string()];
        let filter = tag_filter("anyscale-session-id", &clusters);
        assert_eq!(filter.name(), Some("tag:anyscale-session-id"));
        assert_eq!(filter.values(), ["ses_a".to_string(), "ses_b".to_string()]);
    }

    #[test]
    fn only_running_instances_are_requested() {
        let filter = running_filter();
        assert_eq!(filter.name(), Some("instance-state-name"));
        assert_eq!(filter.values(), ["running".to_string()]);
    }

    #[tokio::test]
    async fn no_clusters_means_no_request() {
        let sdk = SdkConfig::builder().build();
        let directory = Ec2Directory::new(sdk, "anyscale-session-id");
        let ids = directory.discover("us-west-2", &[]).await.unwrap();
        assert!(ids.is_empty());
    }
}
