//! Kubernetes Client Factory Command Line Tool
//!
//! Resolves the connection profile the library would use and optionally
//! builds clients or queries the master with them.

use std::collections::HashMap;
use clap::Parser;
use log::info;

use kube_client_factory::common::{init_logger, Result};
use kube_client_factory::config::{log_profile, ProcessEnvironment};
use kube_client_factory::{KubeClientFactory, APP_NAME, VERSION};

/// Resolve and inspect the Kubernetes client configuration
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Master address, overriding every discovered one
    #[clap(long)]
    master: Option<String>,

    /// Do not probe the master to choose between http and https
    #[clap(long)]
    no_verify: bool,

    /// Kubeconfig file (defaults to $KUBECONFIG, then ~/.kube/config)
    #[clap(long)]
    kubeconfig: Option<String>,

    /// Property override, e.g. -D kubernetes.master=https://10.0.0.1:6443
    #[clap(short = 'D', long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: String,

    /// Also build the HTTP and websocket clients
    #[clap(long)]
    check: bool,

    /// GET this API path with the HTTP client and print the JSON reply
    #[clap(long)]
    get: Option<String>,

    /// Print the resolved profile as JSON
    #[clap(long)]
    json: bool,
}

fn parse_property(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);

    let properties: HashMap<String, String> = args.properties.into_iter().collect();
    let mut builder = KubeClientFactory::builder()
        .with_environment(ProcessEnvironment::with_properties(properties));

    if let Some(path) = args.kubeconfig {
        builder = builder.with_kubeconfig_file(path);
    }
    if let Some(master) = args.master {
        builder = builder.address(master);
    }
    if args.no_verify {
        builder = builder.verify(false);
    }

    let factory = builder.build()?;
    log_profile(factory.profile());
    if !factory.warnings().is_empty() {
        info!("Resolved with {} warning(s)", factory.warnings().len());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(factory.profile())?);
    } else {
        println!("{}", factory);
    }

    if args.check || args.get.is_some() {
        let http = factory.build_http_client()?;
        info!(
            "HTTP client ready for {} (bearer token: {}, client certificate: {})",
            http.base_url(),
            http.bearer_token().is_some(),
            http.has_client_identity()
        );

        let stream = factory.build_stream_client()?;
        info!("Websocket client ready (hostname verification: {})", stream.verifies_hostname());

        if let Some(path) = args.get {
            let reply: serde_json::Value = http.get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }

    Ok(())
}
