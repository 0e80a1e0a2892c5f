//! Finds certificates that expire within a threshold, in TLS Secrets, control-plane kubeconfig
//! Secrets, and the expiry annotations written onto nodes.
use crate::error::{self, Result};
use crate::kubeconfig::Kubeconfig;
use crate::report::{
    ExpiringCertificate, ExpiryReport, KubeconfigCertificate, KubeconfigSecretExpiry,
    NodeCertificateExpiry, TlsSecretExpiry,
};

use models::constants::{ANNOTATION_CERT_EXPIRATION, CONTROL_PLANE_KIND, SECRET_TYPE_TLS};
use models::inventory::{InventoryClient, SecretQuery};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Node, Secret};
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};
use x509_parser::prelude::{FromDer, X509Certificate};

const TLS_CERT_KEYS: [&str; 2] = ["tls.crt", "ca.crt"];
const KUBECONFIG_SECRET_SUFFIX: &str = "-kubeconfig";
const KUBECONFIG_SECRET_KEY: &str = "value";
const CLUSTER_CERTIFICATE_NAME: &str = "CertificateAuthorityData";
const USER_CERTIFICATE_NAME: &str = "ClientCertificateData";
/// Dates in the node annotation look like `Aug 10, 2021 13:25 UTC`.
const ANNOTATION_DATE_FORMAT: &str = "%b %d, %Y %H:%M";

/// How close to expiry a certificate must be to be reported, in whole days.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExpiryThreshold {
    days: i64,
}

impl ExpiryThreshold {
    pub fn new(days: i64) -> Self {
        ExpiryThreshold { days }
    }

    /// Parses a whole number of days, such as the `--duration` flag.
    pub fn parse(duration: &str) -> Result<Self> {
        let days = duration
            .trim()
            .parse::<i64>()
            .context(error::ConfigSnafu { duration })?;
        Ok(ExpiryThreshold { days })
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    /// A certificate expires soon when fewer than the threshold's whole days remain before
    /// `not_after`. Certificates that have already expired always qualify.
    pub fn expires_soon(&self, not_after: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let remaining = not_after.signed_duration_since(now).num_days();
        remaining < self.days || not_after < now
    }
}

/// Returns the `notAfter` instant of the first certificate in a PEM document.
pub fn certificate_not_after(pem: &[u8], origin: &str) -> Result<DateTime<Utc>> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem).map_err(|err| {
        error::CertificatePemSnafu {
            origin,
            reason: err.to_string(),
        }
        .build()
    })?;
    let (_, cert) = X509Certificate::from_der(&pem.contents).map_err(|err| {
        error::CertificateSnafu {
            origin,
            reason: err.to_string(),
        }
        .build()
    })?;

    Utc.timestamp_opt(cert.validity().not_after.timestamp(), 0)
        .single()
        .context(error::CertificateDateSnafu { origin })
}

/// Parses a node's expiry annotation: `{admin.conf: Aug 10, 2021 13:25 UTC},{apiserver: ...}`.
pub fn parse_expiration_annotation(
    node_name: &str,
    value: &str,
) -> Result<Vec<(String, DateTime<Utc>)>> {
    value
        .split("},")
        .map(|entry| entry.trim().trim_start_matches('{').trim_end_matches('}'))
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(String, DateTime<Utc>)> {
            let (certificate, date) =
                entry
                    .split_once(':')
                    .context(error::AnnotationEntrySnafu {
                        annotation: ANNOTATION_CERT_EXPIRATION,
                        entry,
                        node_name,
                    })?;
            let certificate = certificate.trim();
            let date = date.trim();
            let naive = NaiveDateTime::parse_from_str(
                date.trim_end_matches("UTC").trim(),
                ANNOTATION_DATE_FORMAT,
            )
            .context(error::AnnotationDateSnafu {
                date,
                certificate,
                node_name,
            })?;
            Ok((certificate.to_string(), Utc.from_utc_datetime(&naive)))
        })
        .collect()
}

fn is_control_plane_kubeconfig(secret: &Secret) -> bool {
    secret.name_any().ends_with(KUBECONFIG_SECRET_SUFFIX)
        && secret
            .owner_references()
            .iter()
            .any(|owner| owner.kind == CONTROL_PLANE_KIND)
}

/// Collects an `ExpiryReport` from the cluster.
pub struct ExpiryInventory<T: InventoryClient> {
    client: T,
    threshold: ExpiryThreshold,
}

impl<T: InventoryClient> ExpiryInventory<T> {
    pub fn new(client: T, threshold: ExpiryThreshold) -> Self {
        ExpiryInventory { client, threshold }
    }

    /// Checks every source against the threshold as of `now`.
    #[instrument(skip(self), err)]
    pub async fn check(&self, now: DateTime<Utc>) -> Result<ExpiryReport> {
        let report = ExpiryReport {
            tls_secret: self.check_tls_secrets(now).await?,
            kubeconf: self.check_kubeconfig_secrets(now).await?,
            node_cert: self.check_nodes(now).await?,
        };
        event!(
            Level::INFO,
            threshold_days = self.threshold.days(),
            tls_secrets = report.tls_secret.len(),
            kubeconfig_secrets = report.kubeconf.len(),
            nodes = report.node_cert.len(),
            "Checked certificate expiry."
        );
        Ok(report)
    }

    async fn check_tls_secrets(&self, now: DateTime<Utc>) -> Result<Vec<TlsSecretExpiry>> {
        let secrets = self
            .client
            .list_secrets(&SecretQuery::all().of_type(SECRET_TYPE_TLS))
            .await
            .context(error::InventorySnafu)?;

        let mut expiring = Vec::new();
        for secret in secrets.iter() {
            let name = secret.name_any();
            let namespace = secret.namespace().unwrap_or_default();
            let data = secret.data.clone().unwrap_or_default();

            let mut certificates = Vec::new();
            for key in TLS_CERT_KEYS {
                if let Some(pem) = data.get(key) {
                    let origin = format!("Secret '{}/{}' key '{}'", namespace, name, key);
                    let not_after = certificate_not_after(&pem.0, &origin)?;
                    if self.threshold.expires_soon(not_after, now) {
                        certificates.push(ExpiringCertificate {
                            certificate_name: key.to_string(),
                            expiry_date: not_after,
                        });
                    }
                }
            }

            if !certificates.is_empty() {
                expiring.push(TlsSecretExpiry {
                    secret_name: name,
                    secret_namespace: namespace,
                    data: certificates,
                });
            }
        }
        Ok(expiring)
    }

    async fn check_kubeconfig_secrets(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<KubeconfigSecretExpiry>> {
        let secrets = self
            .client
            .list_secrets(&SecretQuery::all())
            .await
            .context(error::InventorySnafu)?;

        let mut expiring = Vec::new();
        for secret in secrets.iter().filter(|s| is_control_plane_kubeconfig(s)) {
            let name = secret.name_any();
            let namespace = secret.namespace().unwrap_or_default();
            let value = secret
                .data
                .as_ref()
                .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
                .context(error::MissingKubeconfigSnafu {
                    namespace: namespace.as_str(),
                    name: name.as_str(),
                })?;
            let kubeconfig = Kubeconfig::from_yaml(&String::from_utf8_lossy(&value.0)).context(
                error::KubeconfigSnafu {
                    namespace: namespace.as_str(),
                    name: name.as_str(),
                },
            )?;

            let mut clusters = Vec::new();
            for cluster in kubeconfig.clusters.iter() {
                if let Some(data) = cluster.cluster.certificate_authority_data.as_deref() {
                    let origin = format!(
                        "Secret '{}/{}' cluster '{}'",
                        namespace, name, cluster.name
                    );
                    if let Some(cert) =
                        self.check_embedded(&cluster.name, CLUSTER_CERTIFICATE_NAME, data, &origin, now)?
                    {
                        clusters.push(cert);
                    }
                }
            }

            let mut users = Vec::new();
            for user in kubeconfig.users.iter() {
                if let Some(data) = user.user.client_certificate_data.as_deref() {
                    let origin = format!("Secret '{}/{}' user '{}'", namespace, name, user.name);
                    if let Some(cert) =
                        self.check_embedded(&user.name, USER_CERTIFICATE_NAME, data, &origin, now)?
                    {
                        users.push(cert);
                    }
                }
            }

            if !clusters.is_empty() || !users.is_empty() {
                expiring.push(KubeconfigSecretExpiry {
                    secret_name: name,
                    secret_namespace: namespace,
                    cluster: clusters,
                    user: users,
                });
            }
        }
        Ok(expiring)
    }

    /// Checks one base64-encoded PEM certificate embedded in a kubeconfig.
    fn check_embedded(
        &self,
        entry_name: &str,
        certificate_name: &str,
        data: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<KubeconfigCertificate>> {
        let pem = STANDARD
            .decode(data.trim())
            .context(error::CertificateDataSnafu { origin })?;
        let not_after = certificate_not_after(&pem, origin)?;

        Ok(self
            .threshold
            .expires_soon(not_after, now)
            .then(|| KubeconfigCertificate {
                name: entry_name.to_string(),
                certificate_name: certificate_name.to_string(),
                expiry_date: not_after,
            }))
    }

    async fn check_nodes(&self, now: DateTime<Utc>) -> Result<Vec<NodeCertificateExpiry>> {
        let nodes = self
            .client
            .list_nodes()
            .await
            .context(error::InventorySnafu)?;

        let mut expiring = Vec::new();
        for node in nodes.iter() {
            if let Some(expiry) = self.check_node(node, now)? {
                expiring.push(expiry);
            }
        }
        Ok(expiring)
    }

    fn check_node(&self, node: &Node, now: DateTime<Utc>) -> Result<Option<NodeCertificateExpiry>> {
        let node_name = node.name_any();
        let annotation = match node.annotations().get(ANNOTATION_CERT_EXPIRATION) {
            Some(annotation) => annotation,
            None => return Ok(None),
        };

        let certificates: Vec<ExpiringCertificate> =
            parse_expiration_annotation(&node_name, annotation)?
                .into_iter()
                .filter(|(_, not_after)| self.threshold.expires_soon(*not_after, now))
                .map(|(certificate_name, expiry_date)| ExpiringCertificate {
                    certificate_name,
                    expiry_date,
                })
                .collect();

        Ok((!certificates.is_empty()).then(|| NodeCertificateExpiry {
            node_name,
            data: certificates,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use chrono::Duration;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use maplit::btreemap;
    use models::inventory::MockInventoryClient;

    const CERT_PEM: &[u8] = include_bytes!("../testdata/ca.pem");

    fn cert_not_after() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2036, 10, 15, 4, 10, 46).unwrap()
    }

    fn tls_secret(namespace: &str, name: &str, keys: &[&str]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some(SECRET_TYPE_TLS.to_string()),
            data: Some(
                keys.iter()
                    .map(|key| (key.to_string(), ByteString(CERT_PEM.to_vec())))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn kubeconfig_secret(name: &str, owner_kind: &str) -> Secret {
        let encoded = STANDARD.encode(CERT_PEM);
        let kubeconfig = format!(
            "apiVersion: v1\nkind: Config\nclusters:\n- name: workload\n  cluster:\n    server: https://10.0.0.1:6443\n    certificate-authority-data: {}\nusers:\n- name: workload-admin\n  user:\n    client-certificate-data: {}\n",
            encoded, encoded
        );
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: owner_kind.to_string(),
                    name: "workload-control-plane".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            data: Some(btreemap! {
                KUBECONFIG_SECRET_KEY.to_string() => ByteString(kubeconfig.into_bytes()),
            }),
            ..Default::default()
        }
    }

    fn annotated_node(name: &str, annotation: Option<&str>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: annotation.map(|value| {
                    btreemap! { ANNOTATION_CERT_EXPIRATION.to_string() => value.to_string() }
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_parse() {
        assert_eq!(ExpiryThreshold::parse("30").unwrap().days(), 30);
        assert_eq!(ExpiryThreshold::parse(" 7 ").unwrap().days(), 7);
        for bad in ["", "30d", "thirty", "1.5"] {
            assert!(matches!(ExpiryThreshold::parse(bad), Err(Error::Config { .. })));
        }
    }

    #[test]
    fn test_expires_soon() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let threshold = ExpiryThreshold::new(30);

        let test_cases = vec![
            (now - Duration::days(1), true),
            (now, true),
            (now + Duration::days(29), true),
            (now + Duration::days(30) - Duration::hours(1), true),
            (now + Duration::days(30), false),
            (now + Duration::days(365), false),
        ];
        for (not_after, expected) in test_cases {
            assert_eq!(threshold.expires_soon(not_after, now), expected, "{}", not_after);
        }

        // With a zero threshold only certificates already past their expiry qualify.
        let threshold = ExpiryThreshold::new(0);
        assert!(threshold.expires_soon(now - Duration::hours(1), now));
        assert!(!threshold.expires_soon(now + Duration::hours(1), now));
    }

    #[test]
    fn test_certificate_not_after() {
        assert_eq!(
            certificate_not_after(CERT_PEM, "test").unwrap(),
            cert_not_after()
        );
        assert!(matches!(
            certificate_not_after(b"not a certificate", "test"),
            Err(Error::CertificatePem { .. })
        ));
    }

    #[test]
    fn test_parse_expiration_annotation() {
        let parsed = parse_expiration_annotation(
            "master-0",
            "{admin.conf: Aug 10, 2021 13:25 UTC},{apiserver: Sep 01, 2021 09:05 UTC}",
        )
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                (
                    "admin.conf".to_string(),
                    Utc.with_ymd_and_hms(2021, 8, 10, 13, 25, 0).unwrap()
                ),
                (
                    "apiserver".to_string(),
                    Utc.with_ymd_and_hms(2021, 9, 1, 9, 5, 0).unwrap()
                ),
            ]
        );

        assert!(matches!(
            parse_expiration_annotation("master-0", "{admin.conf}"),
            Err(Error::AnnotationEntry { .. })
        ));
        assert!(matches!(
            parse_expiration_annotation("master-0", "{admin.conf: next week}"),
            Err(Error::AnnotationDate { .. })
        ));
    }

    fn mock_cluster(secrets: Vec<Secret>, nodes: Vec<Node>) -> MockInventoryClient {
        let mut client = MockInventoryClient::new();
        client.expect_list_secrets().returning(move |query| {
            Ok(secrets
                .iter()
                .filter(|secret| match query.secret_type.as_deref() {
                    Some(secret_type) => secret.type_.as_deref() == Some(secret_type),
                    None => true,
                })
                .cloned()
                .collect())
        });
        client
            .expect_list_nodes()
            .return_once(move || Ok(nodes));
        client
    }

    #[tokio::test]
    async fn test_check_reports_expiring_certificates() {
        let client = mock_cluster(
            vec![
                tls_secret("kube-system", "etcd-certs", &["tls.crt", "ca.crt"]),
                tls_secret("default", "ingress", &["tls.crt"]),
                kubeconfig_secret("workload-kubeconfig", CONTROL_PLANE_KIND),
                kubeconfig_secret("unowned-kubeconfig", "Cluster"),
            ],
            vec![
                annotated_node(
                    "master-0",
                    Some("{admin.conf: Aug 10, 2036 13:25 UTC},{apiserver: Aug 10, 2099 13:25 UTC}"),
                ),
                annotated_node("worker-0", None),
            ],
        );
        // Twenty days before the test certificate expires.
        let now = cert_not_after() - Duration::days(20);

        let report = ExpiryInventory::new(client, ExpiryThreshold::new(30))
            .check(now)
            .await
            .unwrap();

        assert_eq!(report.tls_secret.len(), 2);
        assert_eq!(report.tls_secret[0].secret_name, "etcd-certs");
        assert_eq!(report.tls_secret[0].data.len(), 2);
        assert_eq!(report.tls_secret[0].data[0].expiry_date, cert_not_after());

        assert_eq!(report.kubeconf.len(), 1);
        assert_eq!(report.kubeconf[0].secret_name, "workload-kubeconfig");
        assert_eq!(report.kubeconf[0].cluster[0].name, "workload");
        assert_eq!(
            report.kubeconf[0].cluster[0].certificate_name,
            CLUSTER_CERTIFICATE_NAME
        );
        assert_eq!(report.kubeconf[0].user[0].name, "workload-admin");

        assert_eq!(report.node_cert.len(), 1);
        assert_eq!(report.node_cert[0].node_name, "master-0");
        assert_eq!(report.node_cert[0].data.len(), 1);
        assert_eq!(report.node_cert[0].data[0].certificate_name, "admin.conf");
    }

    #[tokio::test]
    async fn test_check_nothing_expiring() {
        let client = mock_cluster(
            vec![
                tls_secret("kube-system", "etcd-certs", &["tls.crt"]),
                kubeconfig_secret("workload-kubeconfig", CONTROL_PLANE_KIND),
            ],
            vec![],
        );
        let now = cert_not_after() - Duration::days(365);

        let report = ExpiryInventory::new(client, ExpiryThreshold::new(30))
            .check(now)
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_check_rejects_invalid_certificate() {
        let mut secret = tls_secret("kube-system", "broken", &[]);
        secret.data = Some(btreemap! {
            "tls.crt".to_string() => ByteString(b"garbage".to_vec()),
        });
        let client = mock_cluster(vec![secret], vec![]);

        let err = ExpiryInventory::new(client, ExpiryThreshold::new(30))
            .check(Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CertificatePem { .. }));
        assert!(err.to_string().contains("kube-system/broken"));
    }

    #[tokio::test]
    async fn test_check_rejects_undecodable_kubeconfig_certificate() {
        let mut secret = kubeconfig_secret("workload-kubeconfig", CONTROL_PLANE_KIND);
        let kubeconfig = "clusters:\n- name: workload\n  cluster:\n    certificate-authority-data: '%%not-base64%%'\nusers: []\n";
        secret.data = Some(btreemap! {
            KUBECONFIG_SECRET_KEY.to_string() => ByteString(kubeconfig.as_bytes().to_vec()),
        });
        let client = mock_cluster(vec![secret], vec![]);

        let err = ExpiryInventory::new(client, ExpiryThreshold::new(30))
            .check(Utc::now())
            .await
            .unwrap_err();
        match err {
            Error::CertificateData { ref origin, .. } => {
                assert_eq!(origin, "Secret 'default/workload-kubeconfig' cluster 'workload'")
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
