use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use deskpay::bus::task_queue::TaskQueue;
use deskpay::bus::EventBus;
use deskpay::config::AppConfig;
use deskpay::domain::event::event_types;
use deskpay::gateways::flutterwave::FlutterwaveAdapter;
use deskpay::gateways::paystack::PaystackAdapter;
use deskpay::gateways::GatewayRegistry;
use deskpay::repo::balances_repo::BalancesRepo;
use deskpay::repo::bank_accounts_repo::BankAccountsRepo;
use deskpay::repo::cancellations_repo::CancellationsRepo;
use deskpay::repo::notifications_repo::NotificationsRepo;
use deskpay::repo::orders_repo::OrdersRepo;
use deskpay::repo::payments_repo::PaymentsRepo;
use deskpay::repo::refunds_repo::RefundsRepo;
use deskpay::repo::webhooks_repo::WebhooksRepo;
use deskpay::repo::withdrawals_repo::WithdrawalsRepo;
use deskpay::service::cancellation_service::CancellationService;
use deskpay::service::payment_flow::PaymentFlowService;
use deskpay::service::webhook_ingestor::WebhookIngestor;
use deskpay::service::withdrawal_workflow::WithdrawalWorkflow;
use deskpay::subscribers::email::EmailSubscriber;
use deskpay::subscribers::push::PushSubscriber;
use deskpay::subscribers::qr::QrSubscriber;
use deskpay::AppState;
use lettre::{AsyncSmtpTransport, Tokio1Executor};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let orders = OrdersRepo { pool: pool.clone() };
    let payments_repo = PaymentsRepo { pool: pool.clone() };
    let webhooks_repo = WebhooksRepo { pool: pool.clone() };
    let refunds_repo = RefundsRepo { pool: pool.clone() };
    let cancellations_repo = CancellationsRepo { pool: pool.clone() };
    let withdrawals_repo = WithdrawalsRepo { pool: pool.clone() };
    let bank_accounts = BankAccountsRepo { pool: pool.clone() };
    let balances = BalancesRepo { pool: pool.clone() };
    let notifications = NotificationsRepo { pool: pool.clone() };

    let mut registry = GatewayRegistry::new();
    registry.register(Arc::new(PaystackAdapter {
        base_url: cfg.paystack_base_url.clone(),
        secret_key: cfg.paystack_secret_key.clone(),
        timeout_ms: cfg.gateway_timeout_ms,
        client: reqwest::Client::new(),
    }));
    registry.register(Arc::new(FlutterwaveAdapter {
        base_url: cfg.flutterwave_base_url.clone(),
        secret_key: cfg.flutterwave_secret_key.clone(),
        verif_hash: cfg.flutterwave_verif_hash.clone(),
        timeout_ms: cfg.gateway_timeout_ms,
        client: reqwest::Client::new(),
    }));

    let queue = TaskQueue::start(cfg.side_effect_max_attempts, Duration::from_secs(1));
    let bus = EventBus::new();

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::from_url(&cfg.smtp_url)?.build();
    let email = Arc::new(EmailSubscriber {
        mailer,
        from: cfg.smtp_from.parse()?,
        ops: cfg.ops_email.parse()?,
        queue: queue.clone(),
        notifications: notifications.clone(),
    });
    let push = Arc::new(PushSubscriber {
        client: reqwest::Client::new(),
        relay_url: cfg.push_relay_url.clone(),
        token: cfg.push_relay_token.clone(),
        queue: queue.clone(),
        notifications,
    });
    let qr = Arc::new(QrSubscriber {
        orders: orders.clone(),
    });

    for event_type in [
        event_types::WITHDRAWAL_REQUESTED,
        event_types::WITHDRAWAL_FAILED,
        event_types::REFUND_FAILED,
    ] {
        bus.subscribe(event_type, email.clone());
    }
    for event_type in [
        event_types::ORDER_PAID,
        event_types::ORDER_FAILED,
        event_types::BOOKING_CANCELLED,
        event_types::REFUND_COMPLETED,
        event_types::WITHDRAWAL_APPROVED,
        event_types::WITHDRAWAL_REJECTED,
        event_types::WITHDRAWAL_COMPLETED,
    ] {
        bus.subscribe(event_type, push.clone());
    }
    bus.subscribe(event_types::ORDER_PAID, qr);

    let payments = Arc::new(PaymentFlowService {
        pool: pool.clone(),
        orders: orders.clone(),
        payments: payments_repo.clone(),
        balances: balances.clone(),
        registry: registry.clone(),
        bus: bus.clone(),
    });
    let cancellations_service = Arc::new(CancellationService {
        pool: pool.clone(),
        orders: orders.clone(),
        payments: payments_repo,
        refunds: refunds_repo,
        cancellations: cancellations_repo.clone(),
        bank_accounts: bank_accounts.clone(),
        registry: registry.clone(),
        payout_provider: cfg.payout_provider.clone(),
        bus: bus.clone(),
    });
    let withdrawals_flow = Arc::new(WithdrawalWorkflow {
        pool: pool.clone(),
        withdrawals: withdrawals_repo.clone(),
        bank_accounts: bank_accounts.clone(),
        balances: balances.clone(),
        registry: registry.clone(),
        payout_provider: cfg.payout_provider.clone(),
        bus: bus.clone(),
    });
    let ingestor = Arc::new(WebhookIngestor {
        webhooks: webhooks_repo,
        registry: registry.clone(),
        bus,
        payments: payments.clone(),
        cancellations: cancellations_service.clone(),
        withdrawals: withdrawals_flow.clone(),
    });

    let state = AppState {
        pool,
        registry,
        payout_provider: cfg.payout_provider.clone(),
        ingestor,
        payments,
        cancellations_service,
        withdrawals_flow,
        orders,
        cancellations_repo,
        withdrawals_repo,
        bank_accounts,
        balances,
    };

    let admin_key = cfg.internal_api_key.clone();
    let admin_routes = Router::new()
        .route(
            "/orders/:order_id/complete",
            post(deskpay::http::handlers::orders::complete_order),
        )
        .route(
            "/cancellations/:cancellation_id/approve",
            post(deskpay::http::handlers::cancellations::approve),
        )
        .route(
            "/cancellations/:cancellation_id/reject",
            post(deskpay::http::handlers::cancellations::reject),
        )
        .route(
            "/withdrawals/:id/approve",
            post(deskpay::http::handlers::withdrawals::approve),
        )
        .route(
            "/withdrawals/:id/reject",
            post(deskpay::http::handlers::withdrawals::reject),
        )
        .route(
            "/withdrawals/:id/process",
            post(deskpay::http::handlers::withdrawals::process),
        )
        .layer(from_fn_with_state(
            admin_key,
            deskpay::http::middleware::admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/health", get(deskpay::http::handlers::ops::health))
        .route("/ops/liveness", get(deskpay::http::handlers::ops::health))
        .route("/ops/readiness", get(deskpay::http::handlers::ops::ready))
        .route(
            "/webhooks/:provider",
            post(deskpay::http::handlers::webhooks::receive),
        )
        .route("/orders", post(deskpay::http::handlers::orders::checkout))
        .route(
            "/orders/:order_id",
            get(deskpay::http::handlers::orders::get_order),
        )
        .route(
            "/orders/:order_id/payments/retry",
            post(deskpay::http::handlers::orders::retry_payment),
        )
        .route(
            "/bookings/:booking_id/cancel",
            post(deskpay::http::handlers::cancellations::cancel_booking),
        )
        .route(
            "/cancellations/:cancellation_id",
            get(deskpay::http::handlers::cancellations::get_cancellation),
        )
        .route(
            "/bank-accounts",
            post(deskpay::http::handlers::withdrawals::create_bank_account),
        )
        .route(
            "/owners/:owner_id/bank-accounts",
            get(deskpay::http::handlers::withdrawals::list_bank_accounts),
        )
        .route(
            "/owners/:owner_id/balance",
            get(deskpay::http::handlers::withdrawals::get_balance),
        )
        .route(
            "/withdrawals",
            post(deskpay::http::handlers::withdrawals::request_withdrawal),
        )
        .route(
            "/withdrawals/:id",
            get(deskpay::http::handlers::withdrawals::get_withdrawal),
        )
        .route(
            "/withdrawals/:id/logs",
            get(deskpay::http::handlers::withdrawals::list_logs),
        )
        .merge(admin_routes)
        .layer(from_fn_with_state(
            deskpay::http::middleware::rate_limit::RateLimitState {
                redis_client: redis::Client::open(cfg.redis_url.clone())?,
                max_per_minute: 300,
            },
            deskpay::http::middleware::rate_limit::enforce,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
