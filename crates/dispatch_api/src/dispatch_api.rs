use crate::http::{build_dispatch_router, DispatchServices};
use common::http::{run_http_server, ApiKeyAuth, HttpServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct DispatchApi {
    services: DispatchServices,
    config: HttpServerConfig,
    auth: ApiKeyAuth,
}

impl DispatchApi {
    pub fn new(services: DispatchServices, config: HttpServerConfig, auth: ApiKeyAuth) -> Self {
        debug!(auth_enabled = auth.is_enabled(), "Initializing dispatch API module");
        Self {
            services,
            config,
            auth,
        }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                let router = build_dispatch_router(self.services, self.auth);
                run_http_server(self.config, router, ctx).await
            })
        }
    }
}
