use std::{
    process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use futures::future::join_all;
use tiercache::{
    ComputeError, DefaultKeyGenerator, FnResource, Params, Provisioner, Resource,
    config::{self, DemoArgs, KeyArgs, Settings},
    error::AppError,
    infra::{telemetry, tiers},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const MAX_DEMO_CONCURRENCY: usize = 1024;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or_else(|| config::Command::Demo(DemoArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Demo(args) => run_demo(settings, args).await,
        config::Command::Key(args) => run_key(&settings, args),
    }
}

fn run_key(settings: &Settings, args: KeyArgs) -> Result<(), AppError> {
    let provisioner =
        Provisioner::with_key_generator(DefaultKeyGenerator::with_separator(&settings.keys.separator));
    println!("{}", provisioner.key_for(&args.slug, &args.params));
    Ok(())
}

async fn run_demo(settings: Settings, args: DemoArgs) -> Result<(), AppError> {
    if args.concurrency == 0 {
        return Err(AppError::validation("demo requires --concurrency of at least 1"));
    }
    let concurrency = args.concurrency.min(MAX_DEMO_CONCURRENCY);

    let provisioner = Arc::new(Provisioner::with_key_generator(
        DefaultKeyGenerator::with_separator(&settings.keys.separator),
    ));
    let layers = tiers::build_layers(&settings.tiers)?;
    let tier_count = layers.len();
    provisioner.register_layers(layers);

    let computations = Arc::new(AtomicUsize::new(0));
    provisioner.register_shared_resource(
        args.slug.clone(),
        demo_resource(
            0..tier_count,
            Arc::clone(&computations),
            Duration::from_millis(args.latency_ms),
        ),
    );

    info!(
        target = "tiercache::demo",
        slug = %args.slug,
        concurrency,
        tiers = tier_count,
        key = %provisioner.key_for(&args.slug, &args.params),
        "Starting demo"
    );

    let params = Params::from(args.params);
    let started_at = Instant::now();
    let tasks = (0..concurrency).map(|_| {
        let provisioner = Arc::clone(&provisioner);
        let slug = args.slug.clone();
        let params = params.clone();
        tokio::spawn(async move { provisioner.provide(&slug, params).await })
    });

    let mut value = Bytes::new();
    for joined in join_all(tasks).await {
        value = joined
            .map_err(|err| AppError::unexpected(format!("demo task failed: {err}")))??;
    }

    info!(
        target = "tiercache::demo",
        callers = concurrency,
        computations = computations.load(Ordering::SeqCst),
        elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0,
        value = %String::from_utf8_lossy(&value),
        "Concurrent provisioning finished"
    );

    let started_at = Instant::now();
    provisioner.provide(&args.slug, params).await?;
    info!(
        target = "tiercache::demo",
        computations = computations.load(Ordering::SeqCst),
        elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0,
        "Repeat request served"
    );

    Ok(())
}

fn demo_resource(
    layers: impl IntoIterator<Item = usize>,
    computations: Arc<AtomicUsize>,
    latency: Duration,
) -> Arc<dyn Resource> {
    Arc::new(FnResource::new(layers, move |slug, params| {
        let computations = Arc::clone(&computations);
        async move {
            tokio::time::sleep(latency).await;
            computations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ComputeError>(Bytes::from(format!("{slug}:{}", params.join("-"))))
        }
    }))
}
