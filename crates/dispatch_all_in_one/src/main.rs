mod config;

use common::delhivery::DelhiveryClient;
use common::domain::CarrierClient;
use common::http::ApiKeyAuth;
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresEwaybillRepository, PostgresPickupRepository,
    PostgresServiceabilityRepository, PostgresShipmentRepository, PostgresTrackingRepository,
    PostgresWaybillRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use dispatch_api::dispatch_api::DispatchApi;
use dispatch_api::domain::{
    EwaybillService, PickupService, ServiceabilityService, ShipmentService, TrackingService,
    WaybillService,
};
use dispatch_api::http::DispatchServices;
use dispatch_runner::Runner;
use goose::MigrationRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        http_port = config.http_port,
        otel_enabled = config.otel_enabled,
        carrier = %config.delhivery_base_url,
        "Starting dispatch service"
    );
    debug!("Configuration: {:?}", config);

    if config.delhivery_api_token.is_empty() {
        warn!("No carrier API token configured; carrier calls will be rejected");
    }

    let services = match initialize_services(&config).await {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to initialize services: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let dispatch_api = DispatchApi::new(
        services,
        config.http_config(),
        ApiKeyAuth::new(config.admin_api_key()),
    );

    let result = Runner::new()
        .with_app_process("dispatch_api", dispatch_api.into_runner_process())
        .with_closer("telemetry", move || async move {
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    if let Err(e) = result {
        error!("Service exiting with error: {:#}", e);
        std::process::exit(1);
    }
    info!("Service stopped");
}

async fn initialize_services(config: &ServiceConfig) -> anyhow::Result<DispatchServices> {
    info!("Initializing PostgreSQL...");
    let postgres_config = config.postgres_config();
    run_postgres_migrations(&postgres_config).await?;
    let postgres_client = PostgresClient::from_config(&postgres_config)?;
    postgres_client.ping().await?;

    info!("Initializing carrier client...");
    let carrier: Arc<dyn CarrierClient> =
        Arc::new(DelhiveryClient::new(config.delhivery_config())?);

    let waybills = Arc::new(WaybillService::new(
        Arc::new(PostgresWaybillRepository::new(postgres_client.clone())),
        carrier.clone(),
    ));
    let shipments = Arc::new(ShipmentService::new(
        Arc::new(PostgresShipmentRepository::new(postgres_client.clone())),
        waybills.clone(),
        carrier.clone(),
        config.delhivery_pickup_location.clone(),
        config.delhivery_seller_name.clone(),
    ));
    let ewaybills = Arc::new(EwaybillService::new(
        Arc::new(PostgresEwaybillRepository::new(postgres_client.clone())),
        carrier.clone(),
    ));
    let serviceability = Arc::new(ServiceabilityService::new(
        Arc::new(PostgresServiceabilityRepository::new(
            postgres_client.clone(),
        )),
        carrier.clone(),
        config.serviceability_max_age(),
        config.carrier_demo_fallback,
    ));
    let tracking = Arc::new(TrackingService::new(
        Arc::new(PostgresTrackingRepository::new(postgres_client.clone())),
        carrier.clone(),
        config.carrier_demo_fallback,
    ));
    let pickups = Arc::new(PickupService::new(
        Arc::new(PostgresPickupRepository::new(postgres_client)),
        carrier,
        config.delhivery_pickup_location.clone(),
    ));

    Ok(DispatchServices {
        waybills,
        shipments,
        ewaybills,
        serviceability,
        tracking,
        pickups,
    })
}

async fn run_postgres_migrations(config: &PostgresConfig) -> anyhow::Result<()> {
    let runner = MigrationRunner::new(
        config.goose_binary_path.clone(),
        config.migrations_dir.clone(),
        "postgres".to_string(),
        config.dsn(),
    );
    runner.run_migrations().await
}
