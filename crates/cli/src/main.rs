//! `image-captioner` binary.
//!
//! Reads configuration from flags and environment variables, wires the
//! Supabase and Hugging Face adapters into a [`CaptionPipeline`], and serves
//! the storage webhook until Ctrl-C or SIGTERM.
//!
//! ## Architectural Layer
//!
//! **Composition root.** This is the only crate that knows every concrete
//! adapter. It is also the only place `anyhow` is used.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use captioner::CaptionPipeline;
use clap::Parser;
use inference::{HuggingFaceClient, HuggingFaceConfig};
use listener::{ListenerConfig, WebhookServer};
use pipeline::{ApiKey, CaptioningConfig, ModelId, TableName};
use reqwest::Url;
use supabase::{HttpObjectFetcher, SupabaseClient, SupabaseConfig};
use tracing::{info, warn};

mod telemetry;

use telemetry::LogFormat;

/// Captions images uploaded to Supabase Storage.
#[derive(Debug, Parser)]
#[command(name = "image-captioner", version, about)]
struct Args {
    /// Address the webhook listener binds to.
    #[arg(long, env = "CAPTIONER_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Supabase project URL, e.g. `https://xyz.supabase.co`.
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Url,

    /// Service-role key used for storage signing and table writes.
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    supabase_key: String,

    /// Hugging Face access token.
    #[arg(long, env = "HUGGINGFACE_ACCESS_TOKEN", hide_env_values = true)]
    hf_token: String,

    /// Inference API base URL.
    #[arg(long, env = "HUGGINGFACE_BASE_URL", default_value = inference::DEFAULT_BASE_URL)]
    hf_base_url: Url,

    /// Image-to-text model.
    #[arg(long, env = "CAPTION_MODEL", default_value = pipeline::DEFAULT_MODEL)]
    model: String,

    /// Table captions are upserted into.
    #[arg(long, env = "CAPTION_TABLE", default_value = pipeline::DEFAULT_CAPTION_TABLE)]
    caption_table: String,

    /// Table whose inserts are captioned; events naming another table are skipped.
    #[arg(long, env = "WEBHOOK_TABLE", default_value = pipeline::DEFAULT_EXPECTED_TABLE)]
    expected_table: String,

    /// Bearer token deliveries must carry. Unset disables the check.
    #[arg(long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    webhook_token: Option<String>,

    /// Lifetime of each signed URL.
    #[arg(
        long,
        env = "SIGNED_URL_EXPIRY_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    signed_url_expiry_secs: u64,

    /// Timeout for storage, table, and download requests.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    http_timeout_secs: u64,

    /// Timeout for a single inference request.
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = 30)]
    inference_timeout_secs: u64,

    /// Largest object the downloader accepts, in bytes.
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = supabase::DEFAULT_MAX_OBJECT_BYTES)]
    max_image_bytes: usize,

    /// OTLP collector endpoint. Unset disables trace export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

impl Args {
    fn captioning_config(&self) -> Result<CaptioningConfig> {
        Ok(CaptioningConfig {
            model: ModelId::new(self.model.clone()).context("--model must not be empty")?,
            signed_url_expiry: Duration::from_secs(self.signed_url_expiry_secs),
            expected_table: TableName::new(self.expected_table.clone())
                .context("--expected-table must not be empty")?,
        })
    }

    fn supabase_config(&self) -> Result<SupabaseConfig> {
        Ok(SupabaseConfig {
            base_url: self.supabase_url.clone(),
            service_key: ApiKey::new(self.supabase_key.clone())
                .context("--supabase-key must not be empty")?,
            caption_table: TableName::new(self.caption_table.clone())
                .context("--caption-table must not be empty")?,
            timeout: Duration::from_secs(self.http_timeout_secs),
        })
    }

    fn huggingface_config(&self) -> Result<HuggingFaceConfig> {
        Ok(HuggingFaceConfig {
            base_url: self.hf_base_url.clone(),
            access_token: ApiKey::new(self.hf_token.clone())
                .context("--hf-token must not be empty")?,
            timeout: Duration::from_secs(self.inference_timeout_secs),
        })
    }

    fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            webhook_token: self.webhook_token.clone().and_then(ApiKey::new),
            ..ListenerConfig::new(self.bind)
        }
    }
}

/// Assembles the pipeline from concrete adapters.
fn build_pipeline(args: &Args) -> Result<CaptionPipeline> {
    let supabase = Arc::new(
        SupabaseClient::new(args.supabase_config()?).context("Failed to build Supabase client")?,
    );
    let fetcher = HttpObjectFetcher::new(
        Duration::from_secs(args.http_timeout_secs),
        args.max_image_bytes,
    )
    .context("Failed to build object fetcher")?;
    let inference = HuggingFaceClient::new(args.huggingface_config()?)
        .context("Failed to build Hugging Face client")?;

    Ok(CaptionPipeline::new(
        supabase.clone(),
        Arc::new(fetcher),
        Arc::new(inference),
        supabase,
        args.captioning_config()?,
    ))
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received, draining in-flight deliveries");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let telemetry = telemetry::init(args.log_format, args.otlp_endpoint.as_deref())
        .context("Failed to initialise telemetry")?;

    let pipeline = build_pipeline(&args)?;
    info!(
        model = %pipeline.config().model,
        expected_table = %pipeline.config().expected_table,
        caption_table = %args.caption_table,
        "Captioning pipeline ready"
    );

    let server = WebhookServer::new(Arc::new(pipeline), args.listener_config());
    let served = server.run(shutdown_signal()).await;

    telemetry.shutdown();
    served.context("Webhook listener failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "image-captioner",
        "--supabase-url",
        "https://xyz.supabase.co",
        "--supabase-key",
        "service-role",
        "--hf-token",
        "hf_abc",
    ];

    fn parse(extra: &[&str]) -> Args {
        Args::try_parse_from(REQUIRED.iter().chain(extra)).unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn explicit_flags_flow_into_every_config() {
        let args = parse(&[
            "--bind",
            "127.0.0.1:9000",
            "--model",
            "Salesforce/blip-image-captioning-large",
            "--caption-table",
            "captions",
            "--expected-table",
            "uploads",
            "--webhook-token",
            "s3cret",
            "--signed-url-expiry-secs",
            "300",
            "--http-timeout-secs",
            "5",
            "--inference-timeout-secs",
            "45",
            "--log-format",
            "pretty",
        ]);

        let captioning = args.captioning_config().unwrap();
        assert_eq!(captioning.model.as_str(), "Salesforce/blip-image-captioning-large");
        assert_eq!(captioning.signed_url_expiry, Duration::from_secs(300));
        assert_eq!(captioning.expected_table.as_str(), "uploads");

        let supabase = args.supabase_config().unwrap();
        assert_eq!(supabase.base_url.as_str(), "https://xyz.supabase.co/");
        assert_eq!(supabase.service_key.expose(), "service-role");
        assert_eq!(supabase.caption_table.as_str(), "captions");
        assert_eq!(supabase.timeout, Duration::from_secs(5));

        let hf = args.huggingface_config().unwrap();
        assert_eq!(hf.access_token.expose(), "hf_abc");
        assert_eq!(hf.timeout, Duration::from_secs(45));

        let listener = args.listener_config();
        assert_eq!(listener.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(listener.webhook_token.unwrap().expose(), "s3cret");
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn empty_webhook_token_disables_the_check() {
        let args = parse(&["--webhook-token", ""]);
        assert!(args.listener_config().webhook_token.is_none());
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let argv = REQUIRED.iter().chain(&["--signed-url-expiry-secs", "0"]);
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn malformed_supabase_url_is_rejected() {
        let argv = [
            "image-captioner",
            "--supabase-url",
            "not a url",
            "--supabase-key",
            "k",
            "--hf-token",
            "t",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn empty_model_is_a_configuration_error() {
        let args = parse(&["--model", ""]);
        let err = args.captioning_config().unwrap_err();
        assert!(err.to_string().contains("--model"));
    }

    #[test]
    fn pipeline_builds_from_valid_arguments() {
        let args = parse(&[]);
        let pipeline = build_pipeline(&args).unwrap();
        assert_eq!(pipeline.config().expected_table.as_str(), "objects");
    }
}
