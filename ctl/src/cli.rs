use argh::FromArgs;
use inventory::OutputFormat;

pub const DEFAULT_EXPIRATION_THRESHOLD: &str = "24h";
pub const DEFAULT_EXPIRY_DAYS: &str = "30";

#[derive(FromArgs, Debug, PartialEq)]
/// Renew and inspect the certificates of a cluster's control plane.
pub struct Arguments {
    /// path to the kubeconfig file; defaults to the usual kubeconfig resolution
    #[argh(option)]
    pub kubeconfig: Option<String>,

    /// kubeconfig context to use instead of the current one
    #[argh(option)]
    pub context: Option<String>,

    #[argh(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand)]
pub enum SubCommand {
    RenewCerts(RenewCertsArgs),
    CheckExpiration(CheckExpirationArgs),
    ResetSaToken(ResetSaTokenArgs),
}

#[derive(FromArgs, Debug, PartialEq)]
/// Renew control-plane certificates, node by node or by replacing control-plane machines.
#[argh(subcommand, name = "renew-certs")]
pub struct RenewCertsArgs {
    /// renew certificates expiring within this duration, such as "24h" (default: 24h)
    #[argh(option, default = "DEFAULT_EXPIRATION_THRESHOLD.to_string()")]
    pub expiration_threshold: String,

    /// true to renew on each node in place, false to roll out new control-plane machines
    /// (default: true)
    #[argh(option, default = "true")]
    pub renew_in_place: bool,

    /// image of the in-place maintenance pod
    #[argh(option)]
    pub image: Option<String>,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Report certificates that expire within a number of days.
#[argh(subcommand, name = "check-expiration")]
pub struct CheckExpirationArgs {
    /// report certificates expiring within this many days (default: 30)
    #[argh(option, default = "DEFAULT_EXPIRY_DAYS.to_string()")]
    pub duration: String,

    /// output format: table, yaml or json (default: table)
    #[argh(option, default = "OutputFormat::Table")]
    pub output: OutputFormat,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Rotate Service Account tokens and restart the pods that mount them.
#[argh(subcommand, name = "reset-sa-token")]
pub struct ResetSaTokenArgs {
    /// namespace of the Service Account token
    #[argh(option)]
    pub namespace: String,

    /// name of the Secret holding the token; every token in the namespace when omitted
    #[argh(option)]
    pub secret_name: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Arguments, argh::EarlyExit> {
        Arguments::from_args(&["renewctl"], args)
    }

    #[test]
    fn test_renew_certs_defaults() {
        let args = parse(&["renew-certs"]).unwrap();
        assert_eq!(args.kubeconfig, None);
        assert_eq!(
            args.subcommand,
            SubCommand::RenewCerts(RenewCertsArgs {
                expiration_threshold: "24h".to_string(),
                renew_in_place: true,
                image: None,
            })
        );
    }

    #[test]
    fn test_renew_certs_rolling_update() {
        let args = parse(&[
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--context",
            "target-cluster",
            "renew-certs",
            "--expiration-threshold",
            "72h",
            "--renew-in-place",
            "false",
        ])
        .unwrap();
        assert_eq!(args.kubeconfig.as_deref(), Some("/tmp/kubeconfig"));
        assert_eq!(args.context.as_deref(), Some("target-cluster"));
        assert_eq!(
            args.subcommand,
            SubCommand::RenewCerts(RenewCertsArgs {
                expiration_threshold: "72h".to_string(),
                renew_in_place: false,
                image: None,
            })
        );
    }

    #[test]
    fn test_check_expiration() {
        let args = parse(&["check-expiration"]).unwrap();
        assert_eq!(
            args.subcommand,
            SubCommand::CheckExpiration(CheckExpirationArgs {
                duration: "30".to_string(),
                output: OutputFormat::Table,
            })
        );

        let args = parse(&["check-expiration", "--duration", "90", "--output", "json"]).unwrap();
        assert_eq!(
            args.subcommand,
            SubCommand::CheckExpiration(CheckExpirationArgs {
                duration: "90".to_string(),
                output: OutputFormat::Json,
            })
        );

        assert!(parse(&["check-expiration", "--output", "csv"]).is_err());
    }

    #[test]
    fn test_reset_sa_token_requires_namespace() {
        assert!(parse(&["reset-sa-token"]).is_err());

        let args = parse(&["reset-sa-token", "--namespace", "kube-system"]).unwrap();
        assert_eq!(
            args.subcommand,
            SubCommand::ResetSaToken(ResetSaTokenArgs {
                namespace: "kube-system".to_string(),
                secret_name: None,
            })
        );
    }
}
