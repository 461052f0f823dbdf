use std::{sync::Arc, time::Duration};

use actix_web::{
    get, middleware,
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use nimbusd_topology::{
    file::FileTopologyProvider, instances::InstancesManager, metrics::Metrics,
};
use nimbusd_trace::init::{prepare_tracing, TraceConfig};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;

use super::{
    config::Config,
    driver::{Backoff, ResyncDriver},
    error::{ConfigError, Error},
};

#[derive(Clone)]
pub struct State {
    pub manager: Arc<InstancesManager>,
    pub registry: Registry,
}

impl State {
    pub fn new(manager: Arc<InstancesManager>, registry: Registry) -> State {
        State { manager, registry }
    }

    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

pub fn start(config: Config, trace: TraceConfig) -> Result<(), Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::StdIo)?
        .block_on(run(config, trace))
}

#[tracing::instrument(skip_all)]
async fn run(config: Config, trace_config: TraceConfig) -> Result<(), Error> {
    prepare_tracing(trace_config).map_err(Error::Trace)?;
    config.validate()?;

    let topology_file = config
        .topology_file
        .clone()
        .ok_or(Error::Config(ConfigError::MissingTopologySource))?;
    tracing::info!(topology_file, "Use file topology provider");

    let registry = Registry::default();
    let metrics = Metrics::default()
        .register(&registry)
        .map_err(Error::Metrics)?;
    let provider = Arc::new(FileTopologyProvider::new(&topology_file));
    let manager = Arc::new(InstancesManager::new(provider).with_metrics(metrics));

    let token = CancellationToken::new();
    let driver = ResyncDriver::new(
        manager.clone(),
        Duration::from_secs(config.resync_interval),
        Backoff::from(&config.backoff),
    );
    let driver_token = token.clone();
    let driver_handle = tokio::spawn(async move { driver.run(driver_token).await });

    let state = State::new(manager, registry);
    tracing::info!(endpoint = config.endpoint, "Start HTTP server");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .configure(routes)
            .wrap(
                middleware::Logger::default()
                    .exclude("/healthz")
                    .exclude("/readyz"),
            )
    })
    .bind(&config.endpoint)
    .map_err(Error::StdIo)?
    .shutdown_timeout(5);

    let res = server.run().await.map_err(Error::StdIo);

    tracing::info!("Shutting down");
    token.cancel();
    if let Err(e) = driver_handle.await {
        tracing::error!(error = %e, "Resync driver panicked");
    }
    res
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(ready)
        .service(metrics_)
        .service(quota)
        .service(subnets)
        .service(interfaces);
}

#[get("/healthz")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

// Ready once the first resync has succeeded.
#[get("/readyz")]
async fn ready(c: Data<State>, _: HttpRequest) -> impl Responder {
    match c.manager.last_resync() {
        Some(_) => HttpResponse::Ok().json("ready"),
        None => HttpResponse::ServiceUnavailable().json("not ready"),
    }
}

#[get("/metrics")]
async fn metrics_(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/quota")]
async fn quota(c: Data<State>, _req: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json(c.manager.get_pool_quota())
}

#[get("/subnets")]
async fn subnets(c: Data<State>, _req: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json(c.manager.get_subnets())
}

#[get("/instances/{id}/interfaces")]
async fn interfaces(c: Data<State>, path: web::Path<String>) -> impl Responder {
    HttpResponse::Ok().json(c.manager.get_interfaces(&path.into_inner()))
}
