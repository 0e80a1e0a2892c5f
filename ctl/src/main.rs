mod cli;

use crate::cli::{
    Arguments, CheckExpirationArgs, RenewCertsArgs, ResetSaTokenArgs, SubCommand,
};

use inventory::{ExpiryInventory, ExpiryThreshold, TokenRotation};
use models::capi::K8SClusterApiClient;
use models::constants::MAINTENANCE_NAMESPACE;
use models::inventory::K8SInventoryClient;
use models::node::K8SMaintenanceClient;
use models::pod::MaintenanceImage;
use models::telemetry;
use renewer::{RenewalMode, RenewalOrchestrator, RenewalOutcome};

use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io;
use std::process;
use std::sync::Arc;
use tracing::{event, Level};

type Result<T> = std::result::Result<T, error::Error>;

#[tokio::main]
async fn main() {
    let args: Arguments = argh::from_env();

    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(args: Arguments) -> Result<()> {
    telemetry::init_telemetry_from_env().context(error::TelemetryInitSnafu)?;

    let k8s_client = k8s_client(args.kubeconfig.as_deref(), args.context.as_deref()).await?;

    match args.subcommand {
        SubCommand::RenewCerts(renew_args) => renew_certs(k8s_client, renew_args).await,
        SubCommand::CheckExpiration(check_args) => check_expiration(k8s_client, check_args).await,
        SubCommand::ResetSaToken(reset_args) => reset_sa_token(k8s_client, reset_args).await,
    }
}

/// Builds a client from an explicit kubeconfig and context, or from the environment when neither
/// is given.
async fn k8s_client(kubeconfig: Option<&str>, context: Option<&str>) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match (kubeconfig, context) {
        (Some(path), _) => {
            let kubeconfig =
                Kubeconfig::read_from(path).context(error::ReadKubeConfigSnafu { path })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context(error::LoadKubeConfigSnafu)?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .context(error::LoadKubeConfigSnafu)?,
        (None, None) => Config::infer().await.context(error::InferConfigSnafu)?,
    };

    kube::Client::try_from(config).context(error::CreateK8sClientSnafu)
}

async fn renew_certs(k8s_client: kube::Client, args: RenewCertsArgs) -> Result<()> {
    let mut image = MaintenanceImage::default();
    if let Some(custom) = args.image {
        image.image = custom;
    }

    let orchestrator = RenewalOrchestrator::new(
        Arc::new(K8SMaintenanceClient::new(k8s_client.clone())),
        Arc::new(K8SClusterApiClient::new(k8s_client)),
    )
    .with_image(image);

    let outcome = orchestrator
        .renew(
            RenewalMode::from(args.renew_in_place),
            &args.expiration_threshold,
        )
        .await
        .context(error::RenewSnafu)?;

    println!("{}", success_banner(&outcome));
    Ok(())
}

fn success_banner(outcome: &RenewalOutcome) -> String {
    match outcome {
        RenewalOutcome::InPlace { renewed_nodes } => format!(
            "Certificates renewed in place on {} control-plane node(s): {}\n\
             Renewal pods are kept in namespace '{}' for inspection. Monitor node health with:\n\
             \n    kubectl get nodes -w",
            renewed_nodes.len(),
            renewed_nodes.join(", "),
            MAINTENANCE_NAMESPACE,
        ),
        RenewalOutcome::RollingUpdate(summary) => format!(
            "Control plane '{}/{}' now uses machine template '{}' (previously '{}').\n\
             Control-plane machines will be replaced one at a time. Monitor progress with:\n\
             \n    kubectl get machines -w\
             \n    kubectl get kcp -w\
             \n    kubectl get nodes -w",
            summary.namespace, summary.control_plane, summary.new_template, summary.previous_template,
        ),
    }
}

async fn check_expiration(k8s_client: kube::Client, args: CheckExpirationArgs) -> Result<()> {
    let threshold = ExpiryThreshold::parse(&args.duration).context(error::InventorySnafu)?;

    let report = ExpiryInventory::new(K8SInventoryClient::new(k8s_client), threshold)
        .check(chrono::Utc::now())
        .await
        .context(error::InventorySnafu)?;

    let stdout = io::stdout();
    report
        .write(args.output, &mut stdout.lock())
        .context(error::InventorySnafu)
}

async fn reset_sa_token(k8s_client: kube::Client, args: ResetSaTokenArgs) -> Result<()> {
    let rotated = TokenRotation::new(K8SInventoryClient::new(k8s_client))
        .rotate(&args.namespace, args.secret_name.as_deref())
        .await
        .context(error::InventorySnafu)?;

    for token in rotated.iter() {
        println!("Rotated token - {}", token.secret_name);
        for pod in token.deleted_pods.iter() {
            println!("Deleted pod - {}", pod);
        }
    }
    event!(Level::INFO, rotated = rotated.len(), "Token rotation complete.");
    println!("Successfully rotated token");
    Ok(())
}

mod error {
    use models::telemetry::TelemetryConfigError;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Error configuring telemetry: '{}'", source))]
        TelemetryInit { source: TelemetryConfigError },

        #[snafu(display("Unable to read kubeconfig '{}': {}", path, source))]
        ReadKubeConfig {
            source: kube::config::KubeconfigError,
            path: String,
        },

        #[snafu(display("Unable to load kubeconfig: {}", source))]
        LoadKubeConfig {
            source: kube::config::KubeconfigError,
        },

        #[snafu(display("Unable to infer Kubernetes client configuration: {}", source))]
        InferConfig {
            source: kube::config::InferConfigError,
        },

        #[snafu(display("Unable to create Kubernetes client: {}", source))]
        CreateK8sClient { source: kube::Error },

        #[snafu(display("{}", source))]
        Renew { source: renewer::error::Error },

        #[snafu(display("{}", source))]
        Inventory { source: inventory::error::Error },
    }
}
