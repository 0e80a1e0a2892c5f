//! The expiry report and its table, YAML and JSON renderings.
use crate::error::{self, Result};

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::ResultExt;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    #[default]
    Table,
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            _ => error::UnknownOutputFormatSnafu { format: s }.fail(),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A certificate expiring within the threshold.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpiringCertificate {
    pub certificate_name: String,
    pub expiry_date: DateTime<Utc>,
}

/// A certificate embedded in a kubeconfig, named by its cluster or user entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KubeconfigCertificate {
    pub name: String,
    pub certificate_name: String,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TlsSecretExpiry {
    pub secret_name: String,
    pub secret_namespace: String,
    pub data: Vec<ExpiringCertificate>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KubeconfigSecretExpiry {
    pub secret_name: String,
    pub secret_namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cluster: Vec<KubeconfigCertificate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user: Vec<KubeconfigCertificate>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeCertificateExpiry {
    pub node_name: String,
    pub data: Vec<ExpiringCertificate>,
}

/// Every certificate found to expire within the threshold, grouped by where it was found.
///
/// Only sources with at least one expiring certificate are listed.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpiryReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tls_secret: Vec<TlsSecretExpiry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kubeconf: Vec<KubeconfigSecretExpiry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_cert: Vec<NodeCertificateExpiry>,
}

impl ExpiryReport {
    pub fn is_empty(&self) -> bool {
        self.tls_secret.is_empty() && self.kubeconf.is_empty() && self.node_cert.is_empty()
    }

    /// Renders the report to `out`. Empty YAML and JSON reports produce no output at all.
    pub fn write<W: Write>(&self, format: OutputFormat, out: &mut W) -> Result<()> {
        match format {
            OutputFormat::Table => self.write_table(out),
            OutputFormat::Yaml => {
                if self.is_empty() {
                    return Ok(());
                }
                let yaml = serde_yaml::to_string(self).context(error::ReportYamlSnafu)?;
                out.write_all(yaml.as_bytes())
                    .context(error::ReportWriteSnafu)
            }
            OutputFormat::Json => {
                if self.is_empty() {
                    return Ok(());
                }
                let json = serde_json::to_string_pretty(self).context(error::ReportJsonSnafu)?;
                writeln!(out, "{}", json).context(error::ReportWriteSnafu)
            }
        }
    }

    fn write_table<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut tls = TableSection::new("TLS SECRETS", "SECRET");
        for secret in self.tls_secret.iter() {
            let location = format!("{}/{}", secret.secret_namespace, secret.secret_name);
            for cert in secret.data.iter() {
                tls.row(out, &cert.certificate_name, &location, &cert.expiry_date)?;
            }
        }

        let mut kubeconfigs = TableSection::new("KUBECONFIG SECRETS", "SECRET");
        for secret in self.kubeconf.iter() {
            let location = format!("{}/{}", secret.secret_namespace, secret.secret_name);
            for cert in secret.cluster.iter() {
                let name = format!("{} (cluster {})", cert.certificate_name, cert.name);
                kubeconfigs.row(out, &name, &location, &cert.expiry_date)?;
            }
            for cert in secret.user.iter() {
                let name = format!("{} (user {})", cert.certificate_name, cert.name);
                kubeconfigs.row(out, &name, &location, &cert.expiry_date)?;
            }
        }

        let mut nodes = TableSection::new("NODE CERTIFICATES", "NODE");
        for node in self.node_cert.iter() {
            for cert in node.data.iter() {
                nodes.row(out, &cert.certificate_name, &node.node_name, &cert.expiry_date)?;
            }
        }

        Ok(())
    }
}

/// One titled table. The header is printed once, just before the first row, so sections without
/// rows print nothing.
struct TableSection {
    title: &'static str,
    location_column: &'static str,
    header_printed: bool,
}

impl TableSection {
    fn new(title: &'static str, location_column: &'static str) -> Self {
        TableSection {
            title,
            location_column,
            header_printed: false,
        }
    }

    fn row<W: Write>(
        &mut self,
        out: &mut W,
        certificate: &str,
        location: &str,
        expiry_date: &DateTime<Utc>,
    ) -> Result<()> {
        if !self.header_printed {
            writeln!(out).context(error::ReportWriteSnafu)?;
            writeln!(out, "{}", self.title).context(error::ReportWriteSnafu)?;
            writeln!(
                out,
                "{:<48} {:<48} {}",
                "CERTIFICATE", self.location_column, "EXPIRY DATE"
            )
            .context(error::ReportWriteSnafu)?;
            self.header_printed = true;
        }
        writeln!(out, "{:<48} {:<48} {}", certificate, location, expiry_date)
            .context(error::ReportWriteSnafu)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 8, 10, 13, 25, 0).unwrap()
    }

    fn sample_report() -> ExpiryReport {
        ExpiryReport {
            tls_secret: vec![
                TlsSecretExpiry {
                    secret_name: "etcd-certs".to_string(),
                    secret_namespace: "kube-system".to_string(),
                    data: vec![
                        ExpiringCertificate {
                            certificate_name: "tls.crt".to_string(),
                            expiry_date: date(),
                        },
                        ExpiringCertificate {
                            certificate_name: "ca.crt".to_string(),
                            expiry_date: date(),
                        },
                    ],
                },
                TlsSecretExpiry {
                    secret_name: "webhook-cert".to_string(),
                    secret_namespace: "capi-system".to_string(),
                    data: vec![ExpiringCertificate {
                        certificate_name: "tls.crt".to_string(),
                        expiry_date: date(),
                    }],
                },
            ],
            kubeconf: vec![],
            node_cert: vec![NodeCertificateExpiry {
                node_name: "master-0".to_string(),
                data: vec![ExpiringCertificate {
                    certificate_name: "apiserver".to_string(),
                    expiry_date: date(),
                }],
            }],
        }
    }

    fn render(report: &ExpiryReport, format: OutputFormat) -> String {
        let mut out = Vec::new();
        report.write(format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "table");
    }

    #[test]
    fn test_table_prints_each_header_once() {
        let table = render(&sample_report(), OutputFormat::Table);

        assert_eq!(table.matches("TLS SECRETS").count(), 1);
        assert_eq!(table.matches("NODE CERTIFICATES").count(), 1);
        assert_eq!(table.matches("CERTIFICATE ").count(), 2);
        assert!(!table.contains("KUBECONFIG SECRETS"));

        let rows: Vec<&str> = table
            .lines()
            .filter(|line| line.ends_with("2021-08-10 13:25:00 UTC"))
            .collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("tls.crt"));
        assert!(rows[0].contains("kube-system/etcd-certs"));
        assert!(rows[3].contains("master-0"));
    }

    #[test]
    fn test_empty_report() {
        let report = ExpiryReport::default();
        assert!(report.is_empty());
        assert_eq!(render(&report, OutputFormat::Table), "");
        assert_eq!(render(&report, OutputFormat::Yaml), "");
        assert_eq!(render(&report, OutputFormat::Json), "");
    }

    #[test]
    fn test_json_report() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&sample_report(), OutputFormat::Json)).unwrap();

        assert_eq!(json["TlsSecret"][0]["SecretName"], "etcd-certs");
        assert_eq!(json["TlsSecret"][0]["Data"][1]["CertificateName"], "ca.crt");
        assert_eq!(
            json["NodeCert"][0]["Data"][0]["ExpiryDate"],
            "2021-08-10T13:25:00Z"
        );
        assert!(json.get("Kubeconf").is_none());
    }

    #[test]
    fn test_yaml_report() {
        let yaml = render(&sample_report(), OutputFormat::Yaml);
        assert!(yaml.starts_with("TlsSecret:"));
        assert!(yaml.contains("SecretNamespace: capi-system"));
        assert!(!yaml.contains("Kubeconf"));
    }
}
