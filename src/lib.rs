use std::sync::Arc;

pub mod bus;
pub mod config;
pub mod domain {
    pub mod cancellation;
    pub mod event;
    pub mod order;
    pub mod payment;
    pub mod refund;
    pub mod withdrawal;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod cancellations;
        pub mod ops;
        pub mod orders;
        pub mod webhooks;
        pub mod withdrawals;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod rate_limit;
    }
}
pub mod policy;
pub mod repo {
    pub mod balances_repo;
    pub mod bank_accounts_repo;
    pub mod cancellations_repo;
    pub mod notifications_repo;
    pub mod orders_repo;
    pub mod payments_repo;
    pub mod refunds_repo;
    pub mod webhooks_repo;
    pub mod withdrawals_repo;
}
pub mod service {
    pub mod cancellation_service;
    pub mod payment_flow;
    pub mod webhook_ingestor;
    pub mod withdrawal_workflow;
}
pub mod subscribers {
    pub mod email;
    pub mod push;
    pub mod qr;
}
pub mod transitions;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub registry: gateways::GatewayRegistry,
    pub payout_provider: String,
    pub ingestor: Arc<service::webhook_ingestor::WebhookIngestor>,
    pub payments: Arc<service::payment_flow::PaymentFlowService>,
    pub cancellations_service: Arc<service::cancellation_service::CancellationService>,
    pub withdrawals_flow: Arc<service::withdrawal_workflow::WithdrawalWorkflow>,
    pub orders: repo::orders_repo::OrdersRepo,
    pub cancellations_repo: repo::cancellations_repo::CancellationsRepo,
    pub withdrawals_repo: repo::withdrawals_repo::WithdrawalsRepo,
    pub bank_accounts: repo::bank_accounts_repo::BankAccountsRepo,
    pub balances: repo::balances_repo::BalancesRepo,
}
