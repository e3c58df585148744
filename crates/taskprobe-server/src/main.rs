//! taskprobe - task queue behavior probes over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use taskprobe_core::app::{Probe, ProbeBuilder};
use taskprobe_core::config::{
    CloudTasksSettings, DEFAULT_OUTBOUND_TIMEOUT, Deployment, IdentitySettings, ProbeConfig,
    QueueBackend, RetrySettings,
};
use taskprobe_core::domain::parse_duration;
use taskprobe_core::impls::{
    CloudTasksConfig, CloudTasksQueue, InMemoryTaskQueue, LocalDispatcher, LocalQueueSettings,
    LocalTaskQueue, OidcTokenVerifier, ProcessEnvironment, ReqwestPeerClient, TaskHeaderVerifier,
    TokenSource,
};
use taskprobe_core::observability::{LogFormat, init_logging};
use taskprobe_core::ports::{Clock, DeliveryVerifier, SystemClock, TaskQueue};
use taskprobe_core::typed::{Invocable, SleepThenPost, SleepThenPostInvoker};

#[derive(Debug, Parser)]
#[command(name = "taskprobe")]
#[command(version, about = "Probes for task queue delivery behavior", long_about = None)]
struct Args {
    /// Listen address.
    #[arg(long, env = "TASKPROBE_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Port override, as set by the hosting platform.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// `local` or `production`.
    #[arg(long, env = "TASKPROBE_DEPLOYMENT", default_value = "local")]
    deployment: Deployment,

    /// Base URL of the sleep worker. Required in production.
    #[arg(long, env = "TASKPROBE_SLEEP_BASE_URL")]
    sleep_base_url: Option<String>,

    #[arg(long, env = "TASKPROBE_QUEUE", default_value = "slow-queue")]
    queue_name: String,

    /// Timeout of outbound calls, e.g. `600s`.
    #[arg(long, env = "TASKPROBE_OUTBOUND_TIMEOUT", value_parser = parse_duration)]
    outbound_timeout: Option<Duration>,

    /// `memory`, `local` or `cloud-tasks`.
    #[arg(long, env = "TASKPROBE_QUEUE_BACKEND", default_value = "local")]
    queue_backend: QueueBackend,

    /// Deliveries per task in the local emulator.
    #[arg(long, env = "TASKPROBE_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    #[arg(long, env = "TASKPROBE_RETRY_BASE_DELAY", default_value = "1s", value_parser = parse_duration)]
    retry_base_delay: Duration,

    #[arg(long, env = "TASKPROBE_RETRY_MULTIPLIER", default_value_t = 2.0)]
    retry_multiplier: f64,

    #[arg(long, env = "TASKPROBE_RETRY_MAX_DELAY", default_value = "60s", value_parser = parse_duration)]
    retry_max_delay: Duration,

    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project_id: Option<String>,

    #[arg(long, env = "TASKPROBE_LOCATION")]
    location: Option<String>,

    /// Public base URL Cloud Tasks delivers to.
    #[arg(long, env = "TASKPROBE_TARGET_BASE_URL")]
    target_base_url: Option<String>,

    /// Service account for OIDC tokens on deliveries. With Cloud Tasks, the
    /// protected endpoint then requires a matching token.
    #[arg(long, env = "TASKPROBE_SERVICE_ACCOUNT_EMAIL")]
    service_account_email: Option<String>,

    /// Static bearer token; Application Default Credentials otherwise.
    #[arg(long, env = "TASKPROBE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "TASKPROBE_CLOUD_TASKS_API")]
    api_base_url: Option<String>,

    /// Service name reported by `/which-service`.
    #[arg(long, env = "TASKPROBE_SERVICE_NAME")]
    service_name: Option<String>,

    /// `json` or `pretty`.
    #[arg(long, env = "TASKPROBE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

impl Args {
    fn config(&self) -> ProbeConfig {
        let mut bind_addr = self.bind;
        if let Some(port) = self.port {
            bind_addr.set_port(port);
        }
        ProbeConfig {
            bind_addr,
            deployment: self.deployment,
            sleep_base_url: self.sleep_base_url.clone(),
            queue_name: self.queue_name.clone(),
            outbound_timeout: self.outbound_timeout.unwrap_or(DEFAULT_OUTBOUND_TIMEOUT),
            queue_backend: self.queue_backend,
            retry: RetrySettings {
                max_attempts: self.max_attempts,
                base_delay: self.retry_base_delay,
                multiplier: self.retry_multiplier,
                max_delay: self.retry_max_delay,
            },
            cloud_tasks: CloudTasksSettings {
                project_id: self.project_id.clone().unwrap_or_default(),
                location: self.location.clone().unwrap_or_default(),
                target_base_url: self.target_base_url.clone(),
                service_account_email: self.service_account_email.clone(),
                access_token: self.access_token.clone(),
                api_base_url: self.api_base_url.clone(),
            },
            identity: IdentitySettings {
                service_name: self.service_name.clone(),
                ..IdentitySettings::default()
            },
            log_format: self.log_format,
        }
    }
}

async fn build_queue(
    config: &ProbeConfig,
    clock: Arc<dyn Clock>,
) -> Result<(Arc<dyn TaskQueue>, Option<LocalDispatcher>)> {
    match config.queue_backend {
        QueueBackend::Memory => Ok((Arc::new(InMemoryTaskQueue::with_clock(clock)), None)),
        QueueBackend::Local => {
            let settings = LocalQueueSettings {
                base_url: config.local_delivery_base_url(),
                policy: config.retry.policy(),
                max_attempts: config.retry.max_attempts,
                delivery_timeout: config.outbound_timeout,
            };
            let (queue, dispatcher) =
                LocalTaskQueue::start(settings, clock).context("failed to start local queue")?;
            Ok((Arc::new(queue), Some(dispatcher)))
        }
        QueueBackend::CloudTasks => {
            let ct = &config.cloud_tasks;
            let mut cloud = CloudTasksConfig::new(
                ct.project_id.clone(),
                ct.location.clone(),
                ct.target_base_url.clone().unwrap_or_default(),
            );
            cloud.service_account_email = ct.service_account_email.clone();
            cloud.dispatch_deadline = config.outbound_timeout;
            if let Some(api) = &ct.api_base_url {
                cloud.api_base_url = api.clone();
            }
            let tokens = match &ct.access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::from_environment()
                    .await
                    .context("failed to load Google credentials")?,
            };
            let queue = CloudTasksQueue::new(cloud, tokens)
                .context("failed to build Cloud Tasks client")?;
            Ok((Arc::new(queue), None))
        }
    }
}

/// What the protected endpoint accepts as proof of queue delivery.
fn build_verifier(config: &ProbeConfig) -> Result<Arc<dyn DeliveryVerifier>> {
    let ct = &config.cloud_tasks;
    Ok(match config.queue_backend {
        // the emulator sends the Cloud Tasks spelling
        QueueBackend::Local => Arc::new(TaskHeaderVerifier::any_spelling()),
        QueueBackend::Memory => Arc::new(TaskHeaderVerifier::app_engine_only()),
        QueueBackend::CloudTasks => match (&ct.service_account_email, &ct.target_base_url) {
            (Some(email), Some(audience)) => Arc::new(OidcTokenVerifier::new(
                audience.clone(),
                email.clone(),
            )?),
            _ => {
                tracing::warn!(
                    "no service account for OIDC tokens; only X-AppEngine-TaskName opens /protected"
                );
                Arc::new(TaskHeaderVerifier::app_engine_only())
            }
        },
    })
}

fn build_probe(config: &ProbeConfig, queue: Arc<dyn TaskQueue>, clock: Arc<dyn Clock>) -> Result<Probe> {
    let peer = Arc::new(ReqwestPeerClient::new()?);
    let local_host = config.bind_addr.to_string();
    let environment = ProcessEnvironment::from_env(&config.identity, config.deployment, &local_host);

    let probe = ProbeBuilder::new()
        .queue(queue)
        .clock(clock)
        .environment(Arc::new(environment))
        .delivery_verifier(build_verifier(config)?)
        .queue_name(config.queue_name.clone())
        .register::<SleepThenPost, _>(SleepThenPostInvoker::new(
            peer,
            config.sleep_url()?,
            config.outbound_timeout,
        ))?
        .expect_kinds(&[SleepThenPost::KIND])
        .build()?;
    Ok(probe)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config();
    init_logging(config.log_format);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (queue, dispatcher) = build_queue(&config, Arc::clone(&clock)).await?;
    let probe = build_probe(&config, queue, clock)?;
    tracing::info!(
        backend = ?config.queue_backend,
        deployment = ?config.deployment,
        queue = %config.queue_name,
        sleep_url = %config.sleep_url()?,
        "probe ready"
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, taskprobe_server::router(Arc::new(probe)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(dispatcher) = dispatcher {
        dispatcher.shutdown_and_join().await;
    }
    Ok(())
}
