//! ProcessEnvironment - 設定と環境変数から組み立てる実行環境
//!
//! App Engine (`GAE_*`) と Cloud Run (`K_*`) の環境変数を読みます。
//! どちらも無いローカル実行では開発用の値になります。

use crate::config::{Deployment, IdentitySettings};
use crate::domain::identity::{IdentitySnapshot, ServiceIdentity};
use crate::ports::ServiceEnvironment;

const DEFAULT_SERVICE: &str = "default";

#[derive(Debug, Clone)]
pub struct ProcessEnvironment {
    app_id: String,
    service_name: String,
    version_id: String,
    instance_id: String,
    datacenter: String,
    default_version_host_name: Option<String>,
    deployment: Deployment,
}

impl ProcessEnvironment {
    /// Read from the process environment.
    pub fn from_env(settings: &IdentitySettings, deployment: Deployment, local_host: &str) -> Self {
        Self::from_lookup(settings, deployment, local_host, |key| std::env::var(key).ok())
    }

    /// Explicit settings win, then the first variable that is set, then a local default.
    pub fn from_lookup(
        settings: &IdentitySettings,
        deployment: Deployment,
        local_host: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let pick = |explicit: &Option<String>, keys: &[&str]| -> Option<String> {
            explicit
                .clone()
                .or_else(|| keys.iter().find_map(|k| lookup(k)))
                .filter(|v| !v.is_empty())
        };

        let app_id = pick(&settings.app_id, &["GOOGLE_CLOUD_PROJECT", "GAE_APPLICATION"])
            .unwrap_or_else(|| "local".to_string());
        let default_version_host_name = pick(
            &settings.default_version_host_name,
            &["GAE_DEFAULT_HOSTNAME"],
        )
        .or_else(|| match deployment {
            Deployment::Local => Some(local_host.to_string()),
            Deployment::Production => None,
        });

        Self {
            service_name: pick(&settings.service_name, &["GAE_SERVICE", "K_SERVICE"])
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            version_id: pick(&settings.version_id, &["GAE_VERSION", "K_REVISION"])
                .unwrap_or_else(|| "local".to_string()),
            instance_id: pick(&settings.instance_id, &["GAE_INSTANCE"])
                .unwrap_or_else(|| format!("local-{}", ulid::Ulid::new())),
            datacenter: pick(&settings.datacenter, &["GAE_ZONE", "CLOUD_RUN_REGION"])
                .unwrap_or_else(|| "local".to_string()),
            app_id,
            default_version_host_name,
            deployment,
        }
    }

    /// Host name that routes to this service.
    ///
    /// `ERROR: ...` when it cannot be derived, so the report still renders.
    fn service_host_name(&self) -> String {
        match (&self.default_version_host_name, self.deployment) {
            (None, _) => "ERROR: default version host name is unknown".to_string(),
            (Some(host), Deployment::Local) => host.clone(),
            (Some(host), Deployment::Production) if self.service_name == DEFAULT_SERVICE => {
                host.clone()
            }
            (Some(host), Deployment::Production) => format!("{}-dot-{}", self.service_name, host),
        }
    }
}

impl ServiceEnvironment for ProcessEnvironment {
    fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            service_name: self.service_name.clone(),
            host_name: self.service_host_name(),
            instance_id: self.instance_id.clone(),
        }
    }

    fn snapshot(&self, request_id: &str) -> IdentitySnapshot {
        IdentitySnapshot {
            app_id: self.app_id.clone(),
            service_name: self.service_name.clone(),
            service_host_name: self.service_host_name(),
            default_version_host_name: self.default_version_host_name.clone().unwrap_or_default(),
            version_id: self.version_id.clone(),
            instance_id: self.instance_id.clone(),
            datacenter: self.datacenter.clone(),
            server_software: format!("taskprobe/{}", env!("CARGO_PKG_VERSION")),
            request_id: request_id.to_string(),
            is_dev: self.deployment == Deployment::Local,
            runtime_version: format!(
                "rust ({}/{})",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn local_defaults() {
        let environment = ProcessEnvironment::from_lookup(
            &IdentitySettings::default(),
            Deployment::Local,
            "localhost:8080",
            env(&[]),
        );
        let snapshot = environment.snapshot("req-1");
        assert_eq!(snapshot.service_name, "default");
        assert_eq!(snapshot.service_host_name, "localhost:8080");
        assert!(snapshot.is_dev);
        assert!(snapshot.instance_id.starts_with("local-"));
        assert_eq!(snapshot.request_id, "req-1");
    }

    #[test]
    fn reads_app_engine_variables() {
        let environment = ProcessEnvironment::from_lookup(
            &IdentitySettings::default(),
            Deployment::Production,
            "unused",
            env(&[
                ("GOOGLE_CLOUD_PROJECT", "probe-project"),
                ("GAE_SERVICE", "worker"),
                ("GAE_VERSION", "20240101t000000"),
                ("GAE_INSTANCE", "00c61b117c"),
                ("GAE_DEFAULT_HOSTNAME", "probe-project.appspot.com"),
            ]),
        );
        let snapshot = environment.snapshot("abc");
        assert_eq!(snapshot.app_id, "probe-project");
        assert_eq!(environment.identity().service_name, "worker");
        assert_eq!(snapshot.service_host_name, "worker-dot-probe-project.appspot.com");
        assert_eq!(snapshot.default_version_host_name, "probe-project.appspot.com");
        assert_eq!(snapshot.instance_id, "00c61b117c");
        assert_eq!(environment.identity(), snapshot.identity());
        assert!(!snapshot.is_dev);
    }

    #[test]
    fn explicit_settings_win_over_environment() {
        let settings = IdentitySettings {
            service_name: Some("subservice".to_string()),
            ..IdentitySettings::default()
        };
        let environment = ProcessEnvironment::from_lookup(
            &settings,
            Deployment::Local,
            "localhost:8080",
            env(&[("GAE_SERVICE", "worker")]),
        );
        assert_eq!(environment.identity().service_name, "subservice");
    }

    #[test]
    fn unknown_host_in_production_is_reported_as_error() {
        let environment = ProcessEnvironment::from_lookup(
            &IdentitySettings::default(),
            Deployment::Production,
            "unused",
            env(&[]),
        );
        assert!(environment.snapshot("r").service_host_name.starts_with("ERROR:"));
    }
}
