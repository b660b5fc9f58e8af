use crate::errors::{ApiError, ApiResult};
use crate::models::*;
use actix_web::dev::ServiceRequest;
use actix_web::{web, HttpRequest, HttpResponse};
use claim_ledger::{ClaimService, Error, PreferenceAction, RateBudget, RateLimiter};

// ===== Health Check =====
pub async fn health_check(service: web::Data<ClaimService>) -> HttpResponse {
    let ledger = service.ledger();

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: ledger.config().service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: ledger.mode(),
        claims: ledger.len(),
    })
}

// ===== Prometheus Metrics =====
pub async fn prometheus_metrics(service: web::Data<ClaimService>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(service.ledger().metrics().render())
}

// ===== Create Claim =====
pub async fn create_claim(
    body: web::Json<CreateClaimBody>,
    service: web::Data<ClaimService>,
) -> ApiResult<HttpResponse> {
    let created = service.create_claim(body.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(created))
}

// ===== Verify Claim =====
pub async fn get_claim(
    req: HttpRequest,
    path: web::Path<String>,
    service: web::Data<ClaimService>,
    limiter: web::Data<RateLimiter>,
) -> ApiResult<HttpResponse> {
    enforce(&req, &service, &limiter, "verify", verify_budget(&service))?;
    verify(&service, &path.into_inner())
}

pub async fn verify_claim(
    req: HttpRequest,
    body: web::Json<VerifyBody>,
    service: web::Data<ClaimService>,
    limiter: web::Data<RateLimiter>,
) -> ApiResult<HttpResponse> {
    enforce(&req, &service, &limiter, "verify", verify_budget(&service))?;
    verify(&service, &body.token)
}

fn verify(service: &ClaimService, token: &str) -> ApiResult<HttpResponse> {
    let claim = service.verify_claim(token)?;
    Ok(HttpResponse::Ok().json(VerifyResponse { valid: true, claim }))
}

fn verify_budget(service: &ClaimService) -> RateBudget {
    service.ledger().config().rate_limits.verify
}

// ===== Redeem Claim =====
pub async fn redeem_claim(
    req: HttpRequest,
    body: web::Json<RedeemBody>,
    service: web::Data<ClaimService>,
    limiter: web::Data<RateLimiter>,
) -> ApiResult<HttpResponse> {
    let budget = service.ledger().config().rate_limits.redeem;
    enforce(&req, &service, &limiter, "redeem", budget)?;

    let body = body.into_inner();
    let result = service
        .redeem_claim(&body.token, body.destination.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(RedeemResponse {
        success: true,
        result,
    }))
}

// ===== Forward Claim =====
pub async fn forward_claim(
    req: HttpRequest,
    body: web::Json<ForwardBody>,
    service: web::Data<ClaimService>,
    limiter: web::Data<RateLimiter>,
) -> ApiResult<HttpResponse> {
    let budget = service.ledger().config().rate_limits.forward;
    enforce(&req, &service, &limiter, "forward", budget)?;

    let body = body.into_inner();
    let forwarded = service
        .forward_claim(&body.token, &body.recipient, body.message)
        .await?;

    Ok(HttpResponse::Ok().json(forwarded))
}

// ===== Preference Actions =====
pub async fn record_action(
    body: web::Json<ActionBody>,
    service: web::Data<ClaimService>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let action = PreferenceAction::from_json(&body.action, body.payload)?;
    let receipt = service.record_preference_action(&body.token, action).await?;

    Ok(HttpResponse::Ok().json(receipt))
}

// ===== Payment Mode =====
pub async fn get_payment_mode(service: web::Data<ClaimService>) -> HttpResponse {
    HttpResponse::Ok().json(service.ledger().runtime())
}

pub async fn set_payment_mode(
    body: web::Json<PaymentModeBody>,
    service: web::Data<ClaimService>,
) -> ApiResult<HttpResponse> {
    let mode = body.requested_mode().ok_or_else(|| {
        ApiError::BadRequest(
            "Specify a payment mode (simulated, testnet or sandbox) or pass demo=true/false"
                .to_string(),
        )
    })?;
    let runtime = service.ledger().switch_mode(mode)?;

    Ok(HttpResponse::Ok().json(PaymentModeResponse {
        runtime,
        updated: true,
    }))
}

// ===== Transaction History =====
pub async fn list_transactions(service: web::Data<ClaimService>) -> HttpResponse {
    let transactions = service.list_transactions();

    HttpResponse::Ok().json(TransactionsResponse {
        count: transactions.len(),
        transactions,
    })
}

// ===== Rate Limiting =====
fn enforce(
    req: &HttpRequest,
    service: &ClaimService,
    limiter: &RateLimiter,
    scope: &str,
    budget: RateBudget,
) -> ApiResult<()> {
    let client = client_identifier(req);
    let decision = limiter.check(&format!("{}:{}", scope, client), budget.limit, budget.window());
    if decision.allowed {
        return Ok(());
    }

    service.ledger().metrics().record_rate_limited();
    tracing::warn!(
        scope,
        client = %client,
        retry_after_ms = decision.retry_after.as_millis() as u64,
        "Rate limit exceeded"
    );

    Err(Error::RateLimited {
        retry_after: decision.retry_after,
    }
    .into())
}

/// First forwarded hop, then proxy headers, then the peer address
pub fn client_identifier(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }

    header("x-real-ip")
        .or_else(|| header("cf-connecting-ip"))
        .map(str::to_string)
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Request line for the access log with the token segment of `GET /api/claims/{token}` hidden
pub fn loggable_request(req: &ServiceRequest) -> String {
    let path = req.path();
    let shown = match path.strip_prefix("/api/claims/") {
        Some(rest) if !rest.is_empty() && !matches!(rest, "verify" | "redeem" | "forward" | "actions") => {
            "/api/claims/<token>"
        }
        _ => path,
    };
    format!("{} {}", req.method(), shown)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

// ===== Configure Routes =====
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::scope("/api")
                .route("/claims", web::post().to(create_claim))
                .route("/claims/verify", web::post().to(verify_claim))
                .route("/claims/redeem", web::post().to(redeem_claim))
                .route("/claims/forward", web::post().to(forward_claim))
                .route("/claims/actions", web::post().to(record_action))
                .route("/claims/{token}", web::get().to(get_claim))
                .route("/transactions", web::get().to(list_transactions))
                .route("/system/payment-mode", web::get().to(get_payment_mode))
                .route("/system/payment-mode", web::post().to(set_payment_mode)),
        )
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(prometheus_metrics));
}
