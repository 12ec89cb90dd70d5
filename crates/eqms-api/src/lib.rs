//! HTTP API for the escalated query management system
//!
//! Public routes (health, auth config, auth callback) are merged with
//! protected routes that sit behind [`middleware::require_auth`]. Every
//! ticket mutation goes through the shared [`TicketGateway`].

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use eqms_auth::JwtValidator;
use eqms_control::{EventBus, Mailer, Notifier, TicketGateway};
use sea_orm::DatabaseConnection;

pub use error::{ApiError, ApiResult};

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: TicketGateway,
    pub jwt: JwtValidator,
    /// Issuer enforced on session tokens, if any
    pub jwt_issuer: Option<String>,
}

impl AppState {
    /// State with a fresh event bus and notifier around `db`
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>, jwt_secret: &[u8]) -> Self {
        let notifier = Notifier::new(db.clone(), mailer);
        let gateway = TicketGateway::new(db, EventBus::default(), notifier);
        Self::with_gateway(gateway, jwt_secret)
    }

    /// State sharing an existing gateway (and its event bus) with the scheduler
    pub fn with_gateway(gateway: TicketGateway, jwt_secret: &[u8]) -> Self {
        Self {
            db: gateway.db().clone(),
            gateway,
            jwt: JwtValidator::new(jwt_secret),
            jwt_issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.jwt = self.jwt.with_issuer(issuer.clone());
        self.jwt_issuer = Some(issuer);
        self
    }

    pub fn events(&self) -> &EventBus {
        self.gateway.events()
    }

    pub fn notifier(&self) -> &Notifier {
        self.gateway.notifier()
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EQMS API",
        version = "0.1.0",
        description = "REST API for escalated query management: tickets, SLA policy, tiers and users",
        contact(
            name = "EQMS Team",
            email = "team@eqms.dev"
        )
    ),
    paths(
        handlers::system::health_check,
        handlers::auth::auth_config,
        handlers::auth::auth_callback,
        handlers::auth::logout,
        handlers::auth::get_current_user,
        handlers::tickets::list_tickets,
        handlers::tickets::get_ticket,
        handlers::tickets::get_ticket_sla,
        handlers::tickets::create_ticket,
        handlers::tickets::update_ticket,
        handlers::tickets::delete_ticket,
        handlers::tickets::update_status,
        handlers::tickets::update_priority,
        handlers::tickets::escalate_ticket,
        handlers::comments::list_comments,
        handlers::comments::create_comment,
        handlers::events::ticket_events,
        handlers::sla_configs::list_sla_configs,
        handlers::sla_configs::create_sla_config,
        handlers::sla_configs::update_sla_config,
        handlers::sla_configs::delete_sla_config,
        handlers::tier_assignments::list_tier_assignments,
        handlers::tier_assignments::create_tier_assignment,
        handlers::tier_assignments::delete_tier_assignment,
        handlers::email::send_email,
        handlers::sbus::list_sbus,
        handlers::sbus::create_sbu,
        handlers::sbus::update_sbu,
        handlers::sbus::delete_sbu,
        handlers::users::list_users,
        handlers::users::search_users,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::analytics::analytics_summary,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::HealthResponse,
            models::AuthConfig,
            models::Ticket,
            models::TicketList,
            models::CreateTicketRequest,
            models::UpdateTicketRequest,
            models::UpdateStatusRequest,
            models::UpdatePriorityRequest,
            models::TicketSla,
            models::Comment,
            models::CommentList,
            models::CreateCommentRequest,
            models::Sbu,
            models::SbuList,
            models::CreateSbuRequest,
            models::UpdateSbuRequest,
            models::SlaConfig,
            models::SlaConfigList,
            models::CreateSlaConfigRequest,
            models::UpdateSlaConfigRequest,
            models::TierAssignment,
            models::TierAssignmentList,
            models::CreateTierAssignmentRequest,
            models::User,
            models::UserList,
            models::CreateUserRequest,
            models::UpdateUserRequest,
            models::SendEmailRequest,
            models::EmailAccepted,
            models::AnalyticsSummary,
            eqms_control::SlaCountdown,
            eqms_control::EmailTemplate,
            eqms_control::TicketEvent,
            eqms_control::TicketEventKind,
            eqms_db::TicketStatus,
            eqms_db::TicketPriority,
            eqms_db::UserRole,
            eqms_db::SbuStatus,
            eqms_db::Tier,
        )
    ),
    tags(
        (name = "tickets", description = "Ticket lifecycle and SLA endpoints"),
        (name = "comments", description = "Ticket comment endpoints"),
        (name = "sla", description = "SLA policy endpoints"),
        (name = "tiers", description = "Escalation tier roster endpoints"),
        (name = "sbus", description = "Business unit endpoints"),
        (name = "users", description = "User and profile endpoints"),
        (name = "email", description = "Notification email endpoints"),
        (name = "analytics", description = "Reporting endpoints"),
        (name = "auth", description = "Session endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// Extra allowed CORS origins (localhost origins are always allowed)
    pub cors_origins: Vec<String>,
    /// HS256 secret shared with the auth provider
    pub jwt_secret: String,
    /// Issuer enforced on session tokens
    pub jwt_issuer: Option<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
            cors_origins: Vec::new(),
            jwt_secret: String::new(),
            jwt_issuer: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server around a gateway shared with the scheduler
    pub fn new(config: ApiServerConfig, gateway: TicketGateway) -> Result<Self, anyhow::Error> {
        if config.jwt_secret.is_empty() {
            anyhow::bail!("A JWT secret is required to validate session tokens");
        }

        let mut state = AppState::with_gateway(gateway, config.jwt_secret.as_bytes());
        if let Some(issuer) = &config.jwt_issuer {
            state = state.with_issuer(issuer.clone());
        }

        Ok(Self {
            config,
            state: Arc::new(state),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = router(self.state.clone()).layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(cors_layer(self.config.cors_origins.clone()));
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

/// All API routes over `state`, without tracing or CORS layers
pub fn router(state: Arc<AppState>) -> Router {
    let api_doc = ApiDoc::openapi();

    // Build PUBLIC routes (no authentication required)
    let public_router = Router::new()
        .route("/api/health", get(handlers::system::health_check))
        .route("/api/auth/config", get(handlers::auth::auth_config))
        .route("/api/auth/callback", get(handlers::auth::auth_callback))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .with_state(state.clone());

    // Build PROTECTED routes (require session token authentication)
    let protected_router = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route(
            "/api/tickets",
            get(handlers::tickets::list_tickets)
                .post(handlers::tickets::create_ticket)
                .put(handlers::tickets::update_ticket)
                .delete(handlers::tickets::delete_ticket),
        )
        .route("/api/tickets/status", patch(handlers::tickets::update_status))
        .route(
            "/api/tickets/priority",
            put(handlers::tickets::update_priority),
        )
        .route("/api/tickets/events", get(handlers::events::ticket_events))
        .route("/api/tickets/{id}", get(handlers::tickets::get_ticket))
        .route("/api/tickets/{id}/sla", get(handlers::tickets::get_ticket_sla))
        .route(
            "/api/tickets/{id}/escalate",
            post(handlers::tickets::escalate_ticket),
        )
        .route(
            "/api/tickets/{id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )
        .route(
            "/api/sla-configs",
            get(handlers::sla_configs::list_sla_configs)
                .post(handlers::sla_configs::create_sla_config)
                .put(handlers::sla_configs::update_sla_config)
                .delete(handlers::sla_configs::delete_sla_config),
        )
        .route(
            "/api/tier-assignments",
            get(handlers::tier_assignments::list_tier_assignments)
                .post(handlers::tier_assignments::create_tier_assignment)
                .delete(handlers::tier_assignments::delete_tier_assignment),
        )
        .route("/api/email", post(handlers::email::send_email))
        .route(
            "/api/sbus",
            get(handlers::sbus::list_sbus)
                .post(handlers::sbus::create_sbu)
                .put(handlers::sbus::update_sbu)
                .delete(handlers::sbus::delete_sbu),
        )
        .route(
            "/api/users",
            get(handlers::users::list_users)
                .post(handlers::users::create_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/api/users/search", get(handlers::users::search_users))
        .route(
            "/api/analytics/summary",
            get(handlers::analytics::analytics_summary),
        )
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // SwaggerUi serves the document at /api/openapi.json
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
        .merge(public_router)
        .merge(protected_router)
}

/// CORS for cookie-based auth: credentials allowed, origins listed explicitly
fn cors_layer(extra_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true)
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str.starts_with("http://localhost:")
                    || origin_str.starts_with("http://127.0.0.1:")
                    || origin_str.starts_with("https://localhost:")
                    || origin_str.starts_with("https://127.0.0.1:")
                    || extra_origins.iter().any(|o| o == origin_str)
            },
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let api_doc = ApiDoc::openapi();
        let json = api_doc.to_json().unwrap();
        assert!(json.contains("/api/tickets/status"));
        assert!(json.contains("/api/sla-configs"));
    }

    #[tokio::test]
    async fn test_server_requires_secret() {
        let db = eqms_db::connect("sqlite::memory:").await.unwrap();
        let notifier = Notifier::new(db.clone(), Arc::new(eqms_control::LogMailer));
        let gateway = TicketGateway::new(db, EventBus::default(), notifier);

        assert!(ApiServer::new(ApiServerConfig::default(), gateway.clone()).is_err());

        let config = ApiServerConfig {
            jwt_secret: "secret".to_string(),
            ..Default::default()
        };
        assert!(ApiServer::new(config, gateway).is_ok());
    }
}
