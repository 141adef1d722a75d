use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use smartcity_core::events::EventBroadcaster;
use smartcity_storage::{DynRecordStore, EventedStore, InMemoryRecordStore};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::{JwtVerifier, Role, RoleGate, require_role};
use crate::cache::{
    CacheService, CacheWarmer, DomainCache, DomainTtls, InvalidatingStore, InvalidationTriggers,
    ReadThrough, read_through,
};
use crate::config::AppConfig;
use crate::{handlers, metrics, middleware as app_middleware, simulator, ws};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: DynRecordStore,
    pub cache: Arc<CacheService>,
    pub domains: DomainCache,
    pub broadcaster: Arc<EventBroadcaster>,
}

pub struct SmartCityServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub fn build_app(state: AppState, cfg: &AppConfig, verifier: Arc<JwtVerifier>) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let gate = |allowed: &'static [Role]| {
        from_fn_with_state(RoleGate::new(verifier.clone(), allowed), require_role)
    };
    let cached = ReadThrough::new(state.cache.clone(), cfg.cache.read_through_ttl())
        .with_max_body(cfg.cache.max_cached_body_bytes);

    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route("/ws", get(ws::ws_handler));

    let readers = Router::new()
        .route("/api/{domain}/latest", get(handlers::latest_record))
        .route("/api/{domain}/history", get(handlers::record_history))
        .route_layer(gate(Role::ANY));

    // The role gate wraps the read-through layer, so cached bodies are only
    // served to authorised callers. Read-through ignores the POST.
    let staff = Router::new()
        .route("/api/dashboard/stats", get(handlers::dashboard_stats))
        .route(
            "/api/{domain}",
            get(handlers::list_records)
                .post(handlers::create_record)
                .layer(from_fn_with_state(cached, read_through)),
        )
        .route("/api/{domain}/{id}", put(handlers::update_record))
        .route_layer(gate(Role::STAFF));

    let admin = Router::new()
        .route("/api/{domain}/{id}", delete(handlers::delete_record))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/clear", post(handlers::clear_cache))
        .route_layer(gate(Role::ADMIN));

    Router::new()
        .merge(public)
        .merge(readers)
        .merge(staff)
        .merge(admin)
        .with_state(state)
        .layer(from_fn(metrics::track_requests))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        // Outermost so the trace span sees the id
        .layer(from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    cache: Option<Arc<CacheService>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            cache: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use a prebuilt cache instead of connecting one from the config.
    pub fn with_cache(mut self, cache: Arc<CacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire the cache, store stack and background tasks.
    ///
    /// Writes flow through `EventedStore(InvalidatingStore(InMemoryRecordStore))`:
    /// the cache is invalidated before the real-time event goes out.
    pub async fn build(self) -> anyhow::Result<SmartCityServer> {
        let cfg = self.config;
        cfg.validate().map_err(anyhow::Error::msg)?;
        if cfg.auth.uses_default_secret() {
            tracing::warn!(
                "auth.jwt_secret is the built-in default; anyone can mint valid tokens. \
                 Set SMARTCITY__AUTH__JWT_SECRET"
            );
        }

        let cache = match self.cache {
            Some(cache) => cache,
            None => crate::create_cache_service(&cfg).await,
        };

        let broadcaster = EventBroadcaster::new_shared();
        let triggers = Arc::new(InvalidationTriggers::new(cache.clone()));
        let store: DynRecordStore = Arc::new(EventedStore::new(
            InvalidatingStore::new(InMemoryRecordStore::new(), triggers),
            broadcaster.clone(),
        ));
        let domains = DomainCache::new(
            cache.clone(),
            store.clone(),
            DomainTtls::from(&cfg.cache.ttl),
        );

        let shutdown = CancellationToken::new();
        let mut tasks = vec![
            cache
                .memory()
                .clone()
                .start_sweeper(cfg.cache.sweep_interval(), shutdown.clone()),
        ];

        let warmer = Arc::new(CacheWarmer::new(
            domains.clone(),
            cfg.cache.warm_interval(),
            cfg.cache.warm_timeout(),
        ));
        tasks.push(warmer.start(shutdown.clone()));

        if cfg.simulator.enabled {
            tasks.extend(simulator::start(
                store.clone(),
                &cfg.simulator,
                shutdown.clone(),
            ));
            tracing::info!("sensor simulator enabled");
        }

        let state = AppState {
            store,
            cache,
            domains,
            broadcaster,
        };
        let verifier = Arc::new(JwtVerifier::new(&cfg.auth.jwt_secret));
        let app = build_app(state.clone(), &cfg, verifier);

        Ok(SmartCityServer {
            addr: self.addr,
            app,
            state,
            shutdown,
            tasks,
        })
    }
}

impl SmartCityServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves, then stop
    /// the background tasks and release the cache.
    pub async fn serve(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        tracing::info!("listening on {}", listener.local_addr()?);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(signal)
            .await;

        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        self.state.cache.shutdown().await;
        tracing::info!("server stopped");

        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn server() -> SmartCityServer {
        ServerBuilder::new().build().await.unwrap()
    }

    fn token(role: Role) -> String {
        JwtVerifier::new(&AppConfig::default().auth.jwt_secret)
            .issue("tester", role, Duration::from_secs(60))
            .unwrap()
    }

    fn get_as(uri: &str, role: Option<Role>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(role) = role {
            req = req.header("authorization", format!("Bearer {}", token(role)));
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let res = server()
            .await
            .router()
            .oneshot(get_as("/healthz", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_route_groups_enforce_roles() {
        let app = server().await.router();

        let res = app
            .clone()
            .oneshot(get_as("/api/air/latest", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(get_as("/api/air/latest", Some(Role::Citizen)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(get_as("/api/air", Some(Role::Citizen)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .clone()
            .oneshot(get_as("/api/cache/stats", Some(Role::Operator)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(get_as("/api/cache/stats", Some(Role::Admin)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(ServerBuilder::new().with_config(cfg).build().await.is_err());
    }
}
