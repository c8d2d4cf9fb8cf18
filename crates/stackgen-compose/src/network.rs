//! Virtual network: a VPC with public and private subnets in each AZ.

use serde_json::{Value, json};
use stackgen_core::intrinsic::{get_att, get_azs, reference, select};
use stackgen_core::{LogicalId, Resource, Stack};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::{ComposeError, ComposeResult};

const ANYWHERE_V4: &str = "0.0.0.0/0";

/// Shape of the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcOptions {
    pub cidr_base: Ipv4Addr,
    pub cidr_prefix: u8,
    pub max_azs: usize,
}

impl Default for VpcOptions {
    fn default() -> Self {
        Self {
            cidr_base: Ipv4Addr::new(10, 0, 0, 0),
            cidr_prefix: 16,
            max_azs: 2,
        }
    }
}

impl VpcOptions {
    pub fn cidr_block(&self) -> String {
        format!("{}/{}", self.cidr_base, self.cidr_prefix)
    }
}

/// A declared VPC.
#[derive(Debug, Clone, PartialEq)]
pub struct Vpc {
    pub id: LogicalId,
    pub public_subnets: Vec<LogicalId>,
    pub private_subnets: Vec<LogicalId>,
    /// Resources that must exist before anything relies on internet access.
    pub internet_connectivity: Vec<LogicalId>,
}

impl Vpc {
    pub fn vpc_ref(&self) -> Value {
        reference(&self.id)
    }

    pub fn public_subnet_refs(&self) -> Value {
        Value::Array(self.public_subnets.iter().map(reference).collect())
    }

    pub fn private_subnet_refs(&self) -> Value {
        Value::Array(self.private_subnets.iter().map(reference).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubnetKind {
    Public,
    Private,
}

impl SubnetKind {
    fn prefix(self) -> &'static str {
        match self {
            SubnetKind::Public => "PublicSubnet",
            SubnetKind::Private => "PrivateSubnet",
        }
    }
}

/// Split `base/prefix` into `count` equally sized, consecutive blocks.
///
/// Fails when the blocks would be smaller than a single address.
pub fn split_cidr(base: Ipv4Addr, prefix: u8, count: usize) -> ComposeResult<Vec<String>> {
    let extra_bits = count.next_power_of_two().trailing_zeros();
    let new_prefix = u32::from(prefix) + extra_bits;
    if new_prefix > 32 {
        return Err(ComposeError::InvalidNetwork(format!(
            "{}/{} cannot be split into {} blocks",
            base, prefix, count
        )));
    }
    let block_size = 1u64 << (32 - new_prefix);
    let start = u64::from(u32::from(base));

    Ok((0..count as u64)
        .map(|i| {
            let addr = Ipv4Addr::from((start + i * block_size) as u32);
            format!("{}/{}", addr, new_prefix)
        })
        .collect())
}

/// Declare the VPC: one public and one private subnet per AZ, an internet
/// gateway, and a NAT gateway per public subnet for private egress.
pub fn declare_vpc(stack: &mut Stack, options: &VpcOptions) -> ComposeResult<Vpc> {
    let stack_name = stack.name.clone();
    let name_tag =
        |path: &str| json!([{ "Key": "Name", "Value": format!("{}/{}", stack_name, path) }]);

    let vpc = stack.add(
        "Vpc/Resource",
        Resource::new("AWS::EC2::VPC").with_properties(json!({
            "CidrBlock": options.cidr_block(),
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "InstanceTenancy": "default",
            "Tags": name_tag("Vpc"),
        })),
    )?;

    let igw = stack.add(
        "Vpc/IGW",
        Resource::new("AWS::EC2::InternetGateway").with_property("Tags", name_tag("Vpc")),
    )?;
    let attachment = stack.add(
        "Vpc/VPCGW",
        Resource::new("AWS::EC2::VPCGatewayAttachment").with_properties(json!({
            "InternetGatewayId": reference(&igw),
            "VpcId": reference(&vpc),
        })),
    )?;

    let cidrs = split_cidr(options.cidr_base, options.cidr_prefix, options.max_azs * 2)?;
    let (public_cidrs, private_cidrs) = cidrs.split_at(options.max_azs);

    let mut public_subnets = Vec::with_capacity(options.max_azs);
    let mut nat_gateways = Vec::with_capacity(options.max_azs);
    let mut internet_connectivity = Vec::new();

    for (az, cidr) in public_cidrs.iter().enumerate() {
        let subnet = declare_subnet(stack, &vpc, SubnetKind::Public, az, cidr)?;
        let base = format!("{}{}", SubnetKind::Public.prefix(), az + 1);

        let route = stack.add(
            &format!("Vpc/{}/DefaultRoute", base),
            Resource::new("AWS::EC2::Route")
                .with_properties(json!({
                    "DestinationCidrBlock": ANYWHERE_V4,
                    "GatewayId": reference(&igw),
                    "RouteTableId": reference(&subnet.route_table),
                }))
                .depends_on(&attachment),
        )?;

        let eip = stack.add(
            &format!("Vpc/{}/EIP", base),
            Resource::new("AWS::EC2::EIP").with_properties(json!({
                "Domain": "vpc",
                "Tags": name_tag(&format!("Vpc/{}", base)),
            })),
        )?;

        let nat = stack.add(
            &format!("Vpc/{}/NATGateway", base),
            Resource::new("AWS::EC2::NatGateway")
                .with_properties(json!({
                    "AllocationId": get_att(&eip, "AllocationId"),
                    "SubnetId": reference(&subnet.id),
                    "Tags": name_tag(&format!("Vpc/{}", base)),
                }))
                .depends_on(&route)
                .depends_on(&subnet.association),
        )?;

        internet_connectivity.push(route);
        internet_connectivity.push(subnet.association.clone());
        public_subnets.push(subnet.id);
        nat_gateways.push(nat);
    }

    let mut private_subnets = Vec::with_capacity(options.max_azs);
    for (az, cidr) in private_cidrs.iter().enumerate() {
        let subnet = declare_subnet(stack, &vpc, SubnetKind::Private, az, cidr)?;
        let base = format!("{}{}", SubnetKind::Private.prefix(), az + 1);

        stack.add(
            &format!("Vpc/{}/DefaultRoute", base),
            Resource::new("AWS::EC2::Route").with_properties(json!({
                "DestinationCidrBlock": ANYWHERE_V4,
                "NatGatewayId": reference(&nat_gateways[az]),
                "RouteTableId": reference(&subnet.route_table),
            })),
        )?;

        private_subnets.push(subnet.id);
    }

    debug!(
        stack = %stack.name,
        cidr = %options.cidr_block(),
        azs = options.max_azs,
        "Declared VPC"
    );

    Ok(Vpc {
        id: vpc,
        public_subnets,
        private_subnets,
        internet_connectivity,
    })
}

struct Subnet {
    id: LogicalId,
    route_table: LogicalId,
    association: LogicalId,
}

fn declare_subnet(
    stack: &mut Stack,
    vpc: &LogicalId,
    kind: SubnetKind,
    az: usize,
    cidr: &str,
) -> ComposeResult<Subnet> {
    let base = format!("Vpc/{}{}", kind.prefix(), az + 1);
    let name = format!("{}/{}", stack.name, base);
    let (subnet_type, public) = match kind {
        SubnetKind::Public => ("Public", true),
        SubnetKind::Private => ("Private", false),
    };

    let id = stack.add(
        &format!("{}/Subnet", base),
        Resource::new("AWS::EC2::Subnet").with_properties(json!({
            "AvailabilityZone": select(az, get_azs()),
            "CidrBlock": cidr,
            "MapPublicIpOnLaunch": public,
            "Tags": [
                { "Key": "aws-cdk:subnet-name", "Value": subnet_type },
                { "Key": "aws-cdk:subnet-type", "Value": subnet_type },
                { "Key": "Name", "Value": name },
            ],
            "VpcId": reference(vpc),
        })),
    )?;

    let route_table = stack.add(
        &format!("{}/RouteTable", base),
        Resource::new("AWS::EC2::RouteTable").with_properties(json!({
            "Tags": [{ "Key": "Name", "Value": name }],
            "VpcId": reference(vpc),
        })),
    )?;

    let association = stack.add(
        &format!("{}/RouteTableAssociation", base),
        Resource::new("AWS::EC2::SubnetRouteTableAssociation").with_properties(json!({
            "RouteTableId": reference(&route_table),
            "SubnetId": reference(&id),
        })),
    )?;

    Ok(Subnet {
        id,
        route_table,
        association,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_core::Environment;

    fn declared() -> (Stack, Vpc) {
        let mut stack = Stack::new("Project-web", Environment::new("123456789012", "us-east-1"));
        let vpc = declare_vpc(&mut stack, &VpcOptions::default()).unwrap();
        (stack, vpc)
    }

    #[test]
    fn test_split_cidr_into_quarters() {
        let blocks = split_cidr(Ipv4Addr::new(10, 0, 0, 0), 16, 4).unwrap();
        assert_eq!(
            blocks,
            vec!["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18", "10.0.192.0/18"]
        );
    }

    #[test]
    fn test_split_cidr_rounds_up_to_power_of_two() {
        let blocks = split_cidr(Ipv4Addr::new(10, 0, 0, 0), 16, 6).unwrap();
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[1], "10.0.32.0/19");
    }

    #[test]
    fn test_split_cidr_too_small_rejected() {
        let result = split_cidr(Ipv4Addr::new(10, 0, 0, 0), 31, 4);
        assert!(matches!(result, Err(ComposeError::InvalidNetwork(_))));
        assert!(split_cidr(Ipv4Addr::new(10, 0, 0, 0), 30, 4).is_ok());
    }

    #[test]
    fn test_oversized_vpc_options_rejected() {
        let mut stack = Stack::new("Project-web", Environment::new("123456789012", "us-east-1"));
        let options = VpcOptions {
            cidr_prefix: 32,
            ..VpcOptions::default()
        };
        assert!(matches!(
            declare_vpc(&mut stack, &options),
            Err(ComposeError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_vpc_resource_counts() {
        let (stack, vpc) = declared();
        let t = &stack.template;
        assert_eq!(t.count_of_type("AWS::EC2::VPC"), 1);
        assert_eq!(t.count_of_type("AWS::EC2::Subnet"), 4);
        assert_eq!(t.count_of_type("AWS::EC2::RouteTable"), 4);
        assert_eq!(t.count_of_type("AWS::EC2::Route"), 4);
        assert_eq!(t.count_of_type("AWS::EC2::NatGateway"), 2);
        assert_eq!(t.count_of_type("AWS::EC2::InternetGateway"), 1);
        assert_eq!(vpc.public_subnets.len(), 2);
        assert_eq!(vpc.private_subnets.len(), 2);
        assert_eq!(vpc.internet_connectivity.len(), 4);
    }

    #[test]
    fn test_public_subnets_map_public_ips() {
        let (stack, vpc) = declared();
        let public = stack.template.resource(&vpc.public_subnets[0]).unwrap();
        assert_eq!(public.property("MapPublicIpOnLaunch"), Some(&json!(true)));
        assert_eq!(public.property("CidrBlock"), Some(&json!("10.0.0.0/18")));

        let private = stack.template.resource(&vpc.private_subnets[1]).unwrap();
        assert_eq!(private.property("MapPublicIpOnLaunch"), Some(&json!(false)));
        assert_eq!(private.property("CidrBlock"), Some(&json!("10.0.192.0/18")));
        assert_eq!(
            private.property("AvailabilityZone"),
            Some(&select(1, get_azs()))
        );
    }

    #[test]
    fn test_private_routes_use_nat() {
        let (stack, _) = declared();
        let nat_routes = stack
            .template
            .resources_of_type("AWS::EC2::Route")
            .filter(|(_, r)| r.property("NatGatewayId").is_some())
            .count();
        assert_eq!(nat_routes, 2);
    }
}
