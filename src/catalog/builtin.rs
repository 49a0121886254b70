//! The built-in endpoint tree.
//!
//! Paths that embed configured identifiers (MAC address, IAM role) are laid
//! out when the catalog is built; every value is read from the request's
//! configuration when served.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::catalog::endpoint::{ContentType, EndpointSpec, ValueContext, ValueProvider};
use crate::catalog::value::Value;
use crate::config::MockConfig;

const META: &str = "latest/meta-data";
const DYNAMIC: &str = "latest/dynamic";

const IDENTITY_SIGNATURE: &str = "dExamplesjNQhhJan7pORLpLSr7lJEF4V2DhKGlyoYVBoUYrY9njyBCmhEayaGrhtS/AWY+LP\nxlVSQURF5n0gwPNCuO6ICT0fNrm5IH7w9ydyaexamplejJw8XvWPxbuRkcN0TAA1p4RtCAqm4ms\nx2oALjWSCBExample=";

const IDENTITY_PKCS7: &str = "MIAGCSqGSIb3DQEHAqCAMIACAQExCzAJBgUrDgMCGgUAMIAGCSqGSIb3DQEHAaCAJIAEggHbewog\nICJhY2NvdW50SWQiIDogIjEyMzQ1Njc4OTAxMiIsCiAgImFyY2hpdGVjdHVyZSIgOiAieDg2XzY0\nIiwKICAiYXZhaWxhYmlsaXR5Wm9uZSIgOiAidXMtZWFzdC0xYSIKfQoAAAAAAAAxggEXMIIBEwIB\nATBpMFwxCzAJBgNVBAYTAlVTMRkwFwYDVQQIExBXYXNoaW5ndG9uIFN0YXRlMRAwDgYDVQQHEwdT\nZWF0dGxlMSAwHgYDVQQKExdBbWF6b24gV2ViIFNlcnZpY2VzIExMQwIJAJa6SNnlXhpnMAkGBSsO\nAwIaBQCgXTAYBgkqhkiG9w0BCQMxCwYJKoZIhvcNAQcBMBwGCSqGSIb3DQEJBTEPFw0yMDA3MDEw\nMDAwMDBaMCMGCSqGSIb3DQEJBDEWBBQExampleMockSignatureValueAAAAAAAAAAAAA=";

fn meta(path: &str) -> String {
    format!("{META}/{path}")
}

fn iso8601(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Timestamp format used by scheduled events.
fn event_time(t: DateTime<Utc>) -> String {
    t.format("%d %b %Y %H:%M:%S GMT").to_string()
}

fn since_start(ctx: &ValueContext<'_>) -> chrono::Duration {
    chrono::Duration::from_std(ctx.started_at.elapsed()).unwrap_or_else(|_| chrono::Duration::zero())
}

fn delay_elapsed(ctx: &ValueContext<'_>, delay_secs: u64) -> bool {
    ctx.started_at.elapsed() >= Duration::from_secs(delay_secs)
}

fn credentials(ctx: &ValueContext<'_>) -> Value {
    let iam = &ctx.config.metadata.iam;
    let issued = ctx.now - since_start(ctx);
    Value::Json(json!({
        "Code": "Success",
        "LastUpdated": iso8601(issued),
        "Type": "AWS-HMAC",
        "AccessKeyId": iam.access_key_id,
        "SecretAccessKey": iam.secret_access_key,
        "Token": iam.session_token,
        "Expiration": iso8601(ctx.now + chrono::Duration::seconds(iam.credentials_ttl_secs)),
    }))
}

fn identity_document(ctx: &ValueContext<'_>) -> Value {
    let md = &ctx.config.metadata;
    Value::Json(json!({
        "accountId": md.account_id,
        "architecture": md.architecture,
        "availabilityZone": md.availability_zone,
        "billingProducts": null,
        "devpayProductCodes": null,
        "marketplaceProductCodes": null,
        "imageId": md.ami_id,
        "instanceId": md.instance_id,
        "instanceType": md.instance_type,
        "kernelId": null,
        "pendingTime": iso8601(ctx.now - since_start(ctx)),
        "privateIp": md.local_ipv4,
        "ramdiskId": null,
        "region": md.region,
        "version": "2017-09-30",
    }))
}

fn scheduled_events(ctx: &ValueContext<'_>) -> Option<Value> {
    let events = &ctx.config.events;
    if !events.enabled {
        return Some(Value::Json(json!([])));
    }
    let not_before = ctx.now + chrono::Duration::seconds(events.not_before_offset_secs);
    let not_after = not_before + chrono::Duration::seconds(events.window_secs);
    Some(Value::Json(json!([{
        "NotBefore": event_time(not_before),
        "NotAfter": event_time(not_after),
        "Code": events.code,
        "Description": events.description,
        "EventId": events.event_id,
        "State": events.state,
    }])))
}

fn spot_instance_action(ctx: &ValueContext<'_>) -> Option<Value> {
    let spot = &ctx.config.spot;
    if !delay_elapsed(ctx, spot.delay_secs) {
        return None;
    }
    Some(Value::Json(json!({
        "action": spot.action.as_str(),
        "time": iso8601(ctx.now + chrono::Duration::seconds(spot.notice_lead_secs)),
    })))
}

fn spot_termination_time(ctx: &ValueContext<'_>) -> Option<Value> {
    let spot = &ctx.config.spot;
    if !delay_elapsed(ctx, spot.delay_secs) {
        return None;
    }
    Some(Value::text(iso8601(
        ctx.now + chrono::Duration::seconds(spot.notice_lead_secs),
    )))
}

fn rebalance(ctx: &ValueContext<'_>) -> Option<Value> {
    let delay = ctx.config.rebalance.delay_secs;
    if !delay_elapsed(ctx, delay) {
        return None;
    }
    // The notice time stays fixed at the moment the recommendation appeared.
    let noticed = ctx.now - since_start(ctx) + chrono::Duration::seconds(delay as i64);
    Some(Value::Json(json!({ "noticeTime": iso8601(noticed) })))
}

/// Empty lists are served as missing.
fn non_empty(items: &[String]) -> Option<Value> {
    (!items.is_empty()).then(|| Value::Lines(items.to_vec()))
}

fn instance_tags(ctx: &ValueContext<'_>) -> Option<Value> {
    let tags = &ctx.config.metadata.tags;
    if ctx.remainder.is_empty() {
        return Some(Value::Lines(tags.keys().cloned().collect()));
    }
    tags.get(ctx.remainder).cloned().map(Value::Text)
}

/// Every built-in endpoint for the given configuration.
pub fn endpoints(config: &MockConfig) -> Vec<EndpointSpec> {
    let md = &config.metadata;
    let mac = |leaf: &str| meta(&format!("network/interfaces/macs/{}/{}", md.mac, leaf));

    let mut out = vec![
        EndpointSpec::computed(meta("ami-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.ami_id))
        }),
        EndpointSpec::computed(meta("ami-launch-index"), |ctx| {
            Some(Value::text(ctx.config.metadata.ami_launch_index.to_string()))
        }),
        EndpointSpec::computed(meta("ami-manifest-path"), |ctx| {
            Some(Value::text(&ctx.config.metadata.ami_manifest_path))
        }),
        EndpointSpec::computed(meta("block-device-mapping/ami"), |ctx| {
            Some(Value::text(&ctx.config.metadata.root_device_name))
        }),
        EndpointSpec::computed(meta("block-device-mapping/root"), |ctx| {
            Some(Value::text(&ctx.config.metadata.root_device_name))
        }),
        EndpointSpec::computed(meta("hostname"), |ctx| {
            Some(Value::text(&ctx.config.metadata.hostname))
        }),
        EndpointSpec::computed(meta("instance-action"), |ctx| {
            Some(Value::text(&ctx.config.metadata.instance_action))
        }),
        EndpointSpec::computed(meta("instance-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.instance_id))
        }),
        EndpointSpec::computed(meta("instance-life-cycle"), |ctx| {
            Some(Value::text(&ctx.config.metadata.instance_life_cycle))
        }),
        EndpointSpec::computed(meta("instance-type"), |ctx| {
            Some(Value::text(&ctx.config.metadata.instance_type))
        }),
        EndpointSpec::computed(meta("local-hostname"), |ctx| {
            Some(Value::text(&ctx.config.metadata.local_hostname))
        }),
        EndpointSpec::computed(meta("local-ipv4"), |ctx| {
            Some(Value::text(&ctx.config.metadata.local_ipv4))
        }),
        EndpointSpec::computed(meta("mac"), |ctx| Some(Value::text(&ctx.config.metadata.mac))),
        EndpointSpec::computed(mac("device-number"), |ctx| {
            Some(Value::text(ctx.config.metadata.device_number.to_string()))
        }),
        EndpointSpec::computed(mac("interface-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.interface_id))
        }),
        EndpointSpec::computed(mac("local-hostname"), |ctx| {
            Some(Value::text(&ctx.config.metadata.local_hostname))
        }),
        EndpointSpec::computed(mac("local-ipv4s"), |ctx| {
            Some(Value::text(&ctx.config.metadata.local_ipv4))
        }),
        EndpointSpec::computed(mac("mac"), |ctx| Some(Value::text(&ctx.config.metadata.mac))),
        EndpointSpec::computed(mac("owner-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.account_id))
        }),
        EndpointSpec::computed(mac("public-hostname"), |ctx| {
            Some(Value::text(&ctx.config.metadata.public_hostname))
        }),
        EndpointSpec::computed(mac("public-ipv4s"), |ctx| {
            Some(Value::text(&ctx.config.metadata.public_ipv4))
        }),
        EndpointSpec::computed(mac("security-group-ids"), |ctx| {
            non_empty(&ctx.config.metadata.security_group_ids)
        }),
        EndpointSpec::computed(mac("security-groups"), |ctx| {
            non_empty(&ctx.config.metadata.security_groups)
        }),
        EndpointSpec::computed(mac("subnet-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.subnet_id))
        }),
        EndpointSpec::computed(mac("subnet-ipv4-cidr-block"), |ctx| {
            Some(Value::text(&ctx.config.metadata.subnet_ipv4_cidr_block))
        }),
        EndpointSpec::computed(mac("vpc-id"), |ctx| Some(Value::text(&ctx.config.metadata.vpc_id))),
        EndpointSpec::computed(mac("vpc-ipv4-cidr-block"), |ctx| {
            Some(Value::text(&ctx.config.metadata.vpc_ipv4_cidr_block))
        }),
        EndpointSpec::computed(meta("placement/availability-zone"), |ctx| {
            Some(Value::text(&ctx.config.metadata.availability_zone))
        }),
        EndpointSpec::computed(meta("placement/availability-zone-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.availability_zone_id))
        }),
        EndpointSpec::computed(meta("placement/region"), |ctx| {
            Some(Value::text(&ctx.config.metadata.region))
        }),
        EndpointSpec::computed(meta("profile"), |ctx| {
            Some(Value::text(&ctx.config.metadata.profile))
        }),
        EndpointSpec::computed(meta("public-hostname"), |ctx| {
            Some(Value::text(&ctx.config.metadata.public_hostname))
        }),
        EndpointSpec::computed(meta("public-ipv4"), |ctx| {
            Some(Value::text(&ctx.config.metadata.public_ipv4))
        }),
        EndpointSpec::computed(meta("public-keys/0/openssh-key"), |ctx| {
            Some(Value::text(&ctx.config.metadata.public_key))
        }),
        EndpointSpec::computed(meta("reservation-id"), |ctx| {
            Some(Value::text(&ctx.config.metadata.reservation_id))
        }),
        EndpointSpec::computed(meta("security-groups"), |ctx| {
            non_empty(&ctx.config.metadata.security_groups)
        }),
        EndpointSpec::computed(meta("services/domain"), |ctx| {
            Some(Value::text(&ctx.config.metadata.services_domain))
        }),
        EndpointSpec::computed(meta("services/partition"), |ctx| {
            Some(Value::text(&ctx.config.metadata.services_partition))
        }),
        EndpointSpec::computed(meta("iam/info"), |ctx| {
            let iam = &ctx.config.metadata.iam;
            Some(Value::Json(json!({
                "Code": "Success",
                "LastUpdated": iso8601(ctx.now - since_start(ctx)),
                "InstanceProfileArn": iam.instance_profile_arn,
                "InstanceProfileId": iam.instance_profile_id,
            })))
        })
        .json(),
        EndpointSpec::computed(
            meta(&format!("iam/security-credentials/{}", md.iam.role_name)),
            |ctx| Some(credentials(ctx)),
        )
        .json()
        .v2(),
        EndpointSpec::computed(
            meta("identity-credentials/ec2/security-credentials/ec2-instance"),
            |ctx| Some(credentials(ctx)),
        )
        .json()
        .v2(),
        EndpointSpec::computed(meta("events/maintenance/scheduled"), scheduled_events).json(),
        EndpointSpec::new(
            meta("events/maintenance/history"),
            ValueProvider::Fixed(Value::Json(json!([]))),
        )
        .json(),
        EndpointSpec::computed(format!("{DYNAMIC}/instance-identity/document"), |ctx| {
            Some(identity_document(ctx))
        })
        .json(),
        EndpointSpec::computed(format!("{DYNAMIC}/instance-identity/document.xml"), |ctx| {
            Some(identity_document(ctx))
        })
        .content_type(ContentType::Xml),
        EndpointSpec::new(
            format!("{DYNAMIC}/instance-identity/signature"),
            ValueProvider::Fixed(Value::text(IDENTITY_SIGNATURE)),
        ),
        EndpointSpec::new(
            format!("{DYNAMIC}/instance-identity/pkcs7"),
            ValueProvider::Fixed(Value::text(IDENTITY_PKCS7)),
        ),
        EndpointSpec::new(
            format!("{DYNAMIC}/fws/instance-monitoring"),
            ValueProvider::Fixed(Value::text("disabled")),
        ),
        EndpointSpec::computed("latest/user-data", |ctx| {
            let data = &ctx.config.metadata.user_data;
            (!data.is_empty()).then(|| Value::text(data))
        }),
    ];

    if md.tags_enabled {
        out.push(EndpointSpec::computed(meta("tags/instance"), instance_tags).prefix().v2());
    }

    if config.spot.enabled {
        out.push(EndpointSpec::computed(meta("spot/instance-action"), spot_instance_action).json());
        out.push(EndpointSpec::computed(meta("spot/termination-time"), spot_termination_time));
    }

    if config.rebalance.enabled {
        out.push(EndpointSpec::computed(meta("events/recommendations/rebalance"), rebalance).json());
    }

    if config.autoscaling.enabled {
        out.push(EndpointSpec::computed(meta("autoscaling/target-lifecycle-state"), |ctx| {
            Some(Value::text(&ctx.config.autoscaling.target_lifecycle_state))
        }));
    }

    out
}
