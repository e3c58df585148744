//! Service identity as seen by the execution environment.

use serde::{Deserialize, Serialize};

use super::payload::FormPayload;

/// The minimal identity threaded through a task payload.
///
/// Empty `host_name` or `instance_id` means the sender did not say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIdentity {
    pub service_name: String,
    pub host_name: String,
    pub instance_id: String,
}

impl ServiceIdentity {
    pub const SERVICE_FIELD: &'static str = "startedByService";
    pub const HOST_FIELD: &'static str = "startedByHost";
    pub const INSTANCE_FIELD: &'static str = "startedByInstance";

    /// Form fields announcing this identity as the originator of a task.
    pub fn to_payload(&self) -> FormPayload {
        FormPayload::new()
            .with(Self::SERVICE_FIELD, self.service_name.clone())
            .with(Self::HOST_FIELD, self.host_name.clone())
            .with(Self::INSTANCE_FIELD, self.instance_id.clone())
    }

    /// Originator named in a task payload. `None` without a service name.
    pub fn from_payload(form: &FormPayload) -> Option<Self> {
        let field = |name: &str| form.first(name).unwrap_or_default().to_string();
        let service_name = field(Self::SERVICE_FIELD);
        if service_name.is_empty() {
            return None;
        }
        Some(Self {
            service_name,
            host_name: field(Self::HOST_FIELD),
            instance_id: field(Self::INSTANCE_FIELD),
        })
    }
}

/// Full snapshot of the environment that is executing the current request.
///
/// Lets a caller tell whether work enqueued by service A ran on A, on another
/// named service, or on another instance of A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub app_id: String,
    pub service_name: String,
    /// Host name resolved for this service, or `ERROR: ...` when resolution failed.
    pub service_host_name: String,
    pub default_version_host_name: String,
    pub version_id: String,
    pub instance_id: String,
    pub datacenter: String,
    pub server_software: String,
    pub request_id: String,
    pub is_dev: bool,
    pub runtime_version: String,
}

impl IdentitySnapshot {
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            service_name: self.service_name.clone(),
            host_name: self.service_host_name.clone(),
            instance_id: self.instance_id.clone(),
        }
    }
}

/// How the executing service relates to the one that enqueued the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginMatch {
    /// Same service, and the same instance when the originator named one.
    SameService,
    /// Same service name, another instance.
    DifferentInstance,
    DifferentService,
    /// The originating service did not say who it was.
    Unknown,
}

impl OriginMatch {
    pub fn compare(started_by: Option<&ServiceIdentity>, executing: &ServiceIdentity) -> Self {
        let Some(started_by) = started_by.filter(|s| !s.service_name.is_empty()) else {
            return OriginMatch::Unknown;
        };
        if started_by.service_name != executing.service_name {
            return OriginMatch::DifferentService;
        }
        if !started_by.instance_id.is_empty() && started_by.instance_id != executing.instance_id {
            return OriginMatch::DifferentInstance;
        }
        OriginMatch::SameService
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(service: &str, instance: &str) -> ServiceIdentity {
        ServiceIdentity {
            service_name: service.to_string(),
            host_name: format!("{service}.example.com"),
            instance_id: instance.to_string(),
        }
    }

    #[rstest]
    #[case(Some(id("default", "i-1")), OriginMatch::SameService)]
    #[case(Some(id("default", "")), OriginMatch::SameService)]
    #[case(Some(id("default", "i-2")), OriginMatch::DifferentInstance)]
    #[case(Some(id("subservice", "i-1")), OriginMatch::DifferentService)]
    #[case(Some(id("", "i-1")), OriginMatch::Unknown)]
    #[case(None, OriginMatch::Unknown)]
    fn origin_match_compares_service_then_instance(
        #[case] started_by: Option<ServiceIdentity>,
        #[case] expected: OriginMatch,
    ) {
        let executing = id("default", "i-1");
        assert_eq!(OriginMatch::compare(started_by.as_ref(), &executing), expected);
    }

    #[test]
    fn identity_travels_through_payload() {
        let original = id("subservice", "i-9");
        let payload = original.to_payload();
        assert_eq!(payload.first("startedByInstance"), Some("i-9"));
        assert_eq!(ServiceIdentity::from_payload(&payload), Some(original));
    }

    #[test]
    fn payload_with_only_service_name_is_still_an_origin() {
        let payload = FormPayload::new().with("startedByService", "default");
        let origin = ServiceIdentity::from_payload(&payload).unwrap();
        assert_eq!(origin.service_name, "default");
        assert!(origin.instance_id.is_empty());
        assert_eq!(ServiceIdentity::from_payload(&FormPayload::new()), None);
    }
}
