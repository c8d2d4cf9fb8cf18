//! Edge: load balancer, HTTPS listener, certificates and DNS aliases.

use serde_json::{Value, json};
use stackgen_config::subdomain_label;
use stackgen_core::intrinsic::{get_att, join, reference};
use stackgen_core::{LogicalId, Resource, Stack};
use tracing::debug;

use crate::ComposeResult;
use crate::network::Vpc;

pub const LOAD_BALANCER_TYPE: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
pub const LISTENER_TYPE: &str = "AWS::ElasticLoadBalancingV2::Listener";
pub const LISTENER_CERTIFICATE_TYPE: &str = "AWS::ElasticLoadBalancingV2::ListenerCertificate";
pub const TARGET_GROUP_TYPE: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";
pub const CERTIFICATE_TYPE: &str = "AWS::CertificateManager::Certificate";
pub const RECORD_SET_TYPE: &str = "AWS::Route53::RecordSet";
pub const SECURITY_GROUP_TYPE: &str = "AWS::EC2::SecurityGroup";

pub const HTTPS_PORT: u16 = 443;
pub const HEALTH_CHECK_PATH: &str = "/";
pub const HEALTH_CHECK_INTERVAL_SECS: u32 = 30;
pub const HEALTH_CHECK_TIMEOUT_SECS: u32 = 5;

/// The hosted zone records and certificate validations go to.
///
/// Without a zone id, records address the zone by name and certificates are
/// left for manual DNS validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub name: String,
    pub id: Option<String>,
}

impl HostedZone {
    pub fn new(name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Fully qualified record name, with a trailing dot.
    pub fn record_name(&self, label: Option<&str>) -> String {
        match label {
            Some(label) => format!("{}.{}.", label, self.name),
            None => format!("{}.", self.name),
        }
    }

    fn zone_property(&self) -> (&'static str, Value) {
        match &self.id {
            Some(id) => ("HostedZoneId", json!(id)),
            None => ("HostedZoneName", json!(self.record_name(None))),
        }
    }

    fn certificate(&self, domain: &str) -> Resource {
        let mut resource = Resource::new(CERTIFICATE_TYPE).with_properties(json!({
            "DomainName": domain,
            "ValidationMethod": "DNS",
        }));
        if let Some(id) = &self.id {
            resource = resource.with_property(
                "DomainValidationOptions",
                json!([{ "DomainName": domain, "HostedZoneId": id }]),
            );
        }
        resource
    }
}

/// A declared application load balancer.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancer {
    pub id: LogicalId,
    pub security_group: LogicalId,
}

impl LoadBalancer {
    pub fn dns_name(&self) -> Value {
        get_att(&self.id, "DNSName")
    }

    fn alias_target(&self) -> Value {
        json!({
            "DNSName": join("", vec![json!("dualstack."), self.dns_name()]),
            "HostedZoneId": get_att(&self.id, "CanonicalHostedZoneID"),
        })
    }
}

/// The HTTPS listener and what it routes to.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpsListener {
    pub id: LogicalId,
    pub target_group: LogicalId,
    pub certificate: LogicalId,
}

/// Certificate, listener attachment and alias record for one extra domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainAlias {
    pub domain: String,
    pub label: String,
    pub certificate: LogicalId,
    pub listener_certificate: LogicalId,
    pub record: LogicalId,
}

/// Declare an internet-facing load balancer in the public subnets, reachable on 443.
pub fn declare_load_balancer(stack: &mut Stack, vpc: &Vpc) -> ComposeResult<LoadBalancer> {
    let lb_id = LogicalId::from_path("lb/Resource");
    let security_group = stack.add(
        "lb/SecurityGroup/Resource",
        Resource::new(SECURITY_GROUP_TYPE).with_properties(json!({
            "GroupDescription": format!("Automatically created Security Group for ELB {}{}", stack.name, lb_id),
            "SecurityGroupIngress": [{
                "CidrIp": "0.0.0.0/0",
                "Description": format!("Allow from anyone on port {}", HTTPS_PORT),
                "FromPort": HTTPS_PORT,
                "IpProtocol": "tcp",
                "ToPort": HTTPS_PORT,
            }],
            "VpcId": vpc.vpc_ref(),
        })),
    )?;

    let mut resource = Resource::new(LOAD_BALANCER_TYPE).with_properties(json!({
        "LoadBalancerAttributes": [
            { "Key": "deletion_protection.enabled", "Value": "false" },
        ],
        "Scheme": "internet-facing",
        "SecurityGroups": [get_att(&security_group, "GroupId")],
        "Subnets": vpc.public_subnet_refs(),
        "Type": "application",
    }));
    for dependency in &vpc.internet_connectivity {
        resource = resource.depends_on(dependency);
    }
    let id = stack.add("lb/Resource", resource)?;

    Ok(LoadBalancer { id, security_group })
}

/// Declare the primary certificate, the target group and the HTTPS listener.
pub fn declare_https_listener(
    stack: &mut Stack,
    lb: &LoadBalancer,
    vpc: &Vpc,
    zone: &HostedZone,
    container_port: u16,
) -> ComposeResult<HttpsListener> {
    let certificate = stack.add("Certificate/Resource", zone.certificate(&zone.name))?;

    let target_group = stack.add(
        "lb/Listener/ECSGroup/Resource",
        Resource::new(TARGET_GROUP_TYPE).with_properties(json!({
            "HealthCheckIntervalSeconds": HEALTH_CHECK_INTERVAL_SECS,
            "HealthCheckPath": HEALTH_CHECK_PATH,
            "HealthCheckPort": container_port.to_string(),
            "HealthCheckTimeoutSeconds": HEALTH_CHECK_TIMEOUT_SECS,
            "Port": container_port,
            "Protocol": "HTTP",
            "TargetGroupAttributes": [
                { "Key": "stickiness.enabled", "Value": "false" },
            ],
            "TargetType": "ip",
            "VpcId": vpc.vpc_ref(),
        })),
    )?;

    let id = stack.add(
        "lb/Listener/Resource",
        Resource::new(LISTENER_TYPE).with_properties(json!({
            "Certificates": [{ "CertificateArn": reference(&certificate) }],
            "DefaultActions": [{
                "TargetGroupArn": reference(&target_group),
                "Type": "forward",
            }],
            "LoadBalancerArn": reference(&lb.id),
            "Port": HTTPS_PORT,
            "Protocol": "HTTPS",
        })),
    )?;

    Ok(HttpsListener {
        id,
        target_group,
        certificate,
    })
}

/// Alias `A` record for the zone apex.
pub fn declare_root_record(
    stack: &mut Stack,
    lb: &LoadBalancer,
    zone: &HostedZone,
) -> ComposeResult<LogicalId> {
    let id = stack.add("RootRecord/Resource", alias_record(lb, zone, None))?;
    Ok(id)
}

/// One certificate, listener certificate and alias record per domain name.
///
/// Records are published as `<first label>.<zone>`.
pub fn declare_domain_aliases(
    stack: &mut Stack,
    lb: &LoadBalancer,
    listener: &HttpsListener,
    zone: &HostedZone,
    domains: &[String],
) -> ComposeResult<Vec<DomainAlias>> {
    let mut aliases = Vec::with_capacity(domains.len());

    for (index, domain) in domains.iter().enumerate() {
        let label = subdomain_label(domain).to_string();

        let certificate = stack.add(
            &format!("Certificate-{}/Resource", index),
            zone.certificate(domain),
        )?;

        let listener_certificate = stack.add(
            &format!("lb/Listener/ListenerCertificate-{}/Resource", index),
            Resource::new(LISTENER_CERTIFICATE_TYPE).with_properties(json!({
                "Certificates": [{ "CertificateArn": reference(&certificate) }],
                "ListenerArn": reference(&listener.id),
            })),
        )?;

        let record = stack.add(
            &format!("AliasRecord-{}/Resource", index),
            alias_record(lb, zone, Some(&label)),
        )?;

        debug!(stack = %stack.name, %domain, %label, "Declared domain alias");

        aliases.push(DomainAlias {
            domain: domain.clone(),
            label,
            certificate,
            listener_certificate,
            record,
        });
    }

    Ok(aliases)
}

fn alias_record(lb: &LoadBalancer, zone: &HostedZone, label: Option<&str>) -> Resource {
    let (zone_key, zone_value) = zone.zone_property();
    Resource::new(RECORD_SET_TYPE)
        .with_properties(json!({
            "AliasTarget": lb.alias_target(),
            "Name": zone.record_name(label),
            "Type": "A",
        }))
        .with_property(zone_key, zone_value)
}
