use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod error;
mod models;
mod services;
mod utils;

use config::Config;
use db::{MemoryStore, PgStore, Store};
use services::{
    BaseRpcReader, ChainReader, ConversationStore, LlmClient, MemoryConversationStore,
    OpenAiClient, RedisConversationStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apex_base_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Apex Base Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        "Chain: {} ({})",
        config.base_chain_id,
        if config.is_testnet() { "testnet" } else { "mainnet" }
    );

    // Initialize store
    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pg = PgStore::new(&config, database_url).await?;
            tracing::info!("Running database migrations...");
            pg.run_migrations().await?;
            Arc::new(pg)
        }
        None => Arc::new(MemoryStore::new()),
    };

    // Conversation sessions
    let conversations: Arc<dyn ConversationStore> = match &config.redis_url {
        Some(redis_url) => Arc::new(
            RedisConversationStore::connect(redis_url, config.conversation_ttl_secs).await?,
        ),
        None => Arc::new(MemoryConversationStore::new(config.conversation_ttl_secs)),
    };

    let chain: Arc<dyn ChainReader> = Arc::new(BaseRpcReader::from_config(&config)?);
    let llm: Option<Arc<dyn LlmClient>> = if config.has_llm_provider() {
        OpenAiClient::from_config(&config)?.map(|client| Arc::new(client) as Arc<dyn LlmClient>)
    } else {
        None
    };

    tracing::info!(
        "Backends: store={} conversations={} llm={}",
        store.backend(),
        conversations.backend(),
        if llm.is_some() {
            config.openai_model.as_str()
        } else {
            "none"
        }
    );

    let app_state = api::AppState::new(config.clone(), store, conversations, chain, llm);

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Tutorials & achievements
        .route("/api/tutorials", get(api::tutorials::list_tutorials))
        .route(
            "/api/achievements",
            get(api::achievements::get_achievements).post(api::achievements::complete_tutorial),
        )
        .route("/api/leaderboard", get(api::leaderboard::get_leaderboard))
        // Tokens & balances
        .route(
            "/api/tokens",
            get(api::tokens::get_tokens)
                .post(api::tokens::add_token)
                .delete(api::tokens::remove_token),
        )
        .route("/api/portfolio", get(api::portfolio::get_portfolio))
        .route("/api/swap/quote", post(api::swap::get_quote))
        // Transactions
        .route(
            "/api/transactions",
            get(api::transactions::get_history)
                .post(api::transactions::record_transaction)
                .patch(api::transactions::update_status),
        )
        .route(
            "/api/transactions/{tx_hash}",
            get(api::transactions::get_details),
        )
        // Chat assistant
        .route("/api/chat", post(api::chat::send_message))
        .route(
            "/api/chat/{conversation_id}",
            get(api::chat::get_conversation).delete(api::chat::clear_conversation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ALICE: &str = "0x000000000000000000000000000000000000a11c";
    const BOB: &str = "0x0000000000000000000000000000000000000b0b";
    const CAROL: &str = "0x0000000000000000000000000000000000000ca1";

    fn app() -> Router {
        build_router(api::test_support::test_state())
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn tx_hash(n: u8) -> String {
        format!("0x{}", hex::encode([n; 32]))
    }

    #[tokio::test]
    async fn health_reports_backends() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "memory (connected)");
        assert_eq!(body["llm"], "keyword-fallback");
    }

    #[tokio::test]
    async fn tutorials_are_listed() {
        let (status, body) = call(&app(), Method::GET, "/api/tutorials", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], "what-is-base");
        assert_eq!(body["data"][0]["points"], 100);
    }

    #[tokio::test]
    async fn completing_a_tutorial_twice_awards_once() {
        let app = app();
        let request = json!({ "userAddress": ALICE, "tutorialId": "what-is-base", "quizScore": 100 });

        let (status, first) = call(&app, Method::POST, "/api/achievements", Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);
        assert_eq!(first["tutorialPoints"], 120);
        assert_eq!(first["progress"]["totalPoints"], 270);

        let (status, second) = call(&app, Method::POST, "/api/achievements", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["success"], false);
        assert_eq!(second["progress"]["totalPoints"], 270);
        assert_eq!(second["progress"]["tutorialsCompleted"], json!(["what-is-base"]));

        let (_, view) = call(
            &app,
            Method::GET,
            &format!("/api/achievements?userAddress={}", ALICE),
            None,
        )
        .await;
        let unlocked: Vec<&str> = view["data"]["achievements"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["unlocked"] == true)
            .filter_map(|a| a["id"].as_str())
            .collect();
        assert_eq!(unlocked, vec!["first-tutorial", "perfect-score"]);
    }

    #[tokio::test]
    async fn invalid_input_returns_json_error() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/achievements",
            Some(json!({ "userAddress": ALICE, "tutorialId": "nope", "quizScore": 50 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Unknown tutorial"));

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/achievements",
            Some(json!({ "userAddress": ALICE })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn token_list_add_and_remove() {
        let app = app();
        let list_uri = format!("/api/tokens?userAddress={}", ALICE);
        let (status, body) = call(&app, Method::GET, &list_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let addresses: Vec<String> = body["data"]["tokens"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["address"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(addresses.len(), 5);

        let add = json!({
            "userAddress": ALICE,
            "token": { "address": api::test_support::AERO, "symbol": "AERO", "decimals": 18 }
        });
        let (status, body) = call(&app, Method::POST, "/api/tokens", Some(add.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["tokens"].as_array().unwrap().len(), 6);

        let (status, _) = call(&app, Method::POST, "/api/tokens", Some(add)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let mut remaining = addresses.clone();
        remaining.push(api::test_support::AERO.to_string());
        let last = remaining.pop().unwrap();
        for address in &remaining {
            let uri = format!("/api/tokens?userAddress={}&address={}", ALICE, address);
            let (status, _) = call(&app, Method::DELETE, &uri, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let uri = format!("/api/tokens?userAddress={}&address={}", ALICE, last);
        let (status, body) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("last token"));
    }

    #[tokio::test]
    async fn portfolio_lists_balances() {
        let (status, body) = call(
            &app(),
            Method::GET,
            &format!("/api/portfolio?address={}", ALICE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balances"][0]["symbol"], "ETH");
        assert_eq!(body["data"]["balances"][0]["balance"], "1");
        assert_eq!(body["data"]["balances"][1]["balance"], "5");
    }

    #[tokio::test]
    async fn swap_quote_applies_slippage() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/swap/quote",
            Some(json!({ "sellToken": "ETH", "buyToken": "USDC", "amount": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amountOut"], "2500");
        assert_eq!(body["data"]["minAmountOut"], "2487.5");
        assert_eq!(body["data"]["minAmountOutBaseUnits"], "2487500000");
        assert_eq!(body["data"]["slippageBps"], 50);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/swap/quote",
            Some(json!({ "sellToken": "ETH", "buyToken": "USDC", "amount": "1", "slippage": 25 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transaction_lifecycle() {
        let app = app();
        let record = json!({
            "userId": ALICE,
            "txHash": tx_hash(1),
            "type": "send",
            "tokenSymbol": "USDC",
            "amount": "10"
        });
        let (status, body) = call(&app, Method::POST, "/api/transactions", Some(record.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "pending");

        let (status, _) = call(&app, Method::POST, "/api/transactions", Some(record)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, list) = call(
            &app,
            Method::GET,
            &format!("/api/transactions?userId={}&type=send", ALICE),
            None,
        )
        .await;
        assert_eq!(list["data"]["total"], 1);

        let patch = json!({ "txHash": tx_hash(1), "status": "completed" });
        let (status, body) = call(&app, Method::PATCH, "/api/transactions", Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");

        let patch = json!({ "txHash": tx_hash(1), "status": "failed" });
        let (status, _) = call(&app, Method::PATCH, "/api/transactions", Some(patch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/transactions/{}", tx_hash(1)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/transactions/{}", tx_hash(2)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points_then_signup() {
        let app = app();
        for (user, tutorial) in [
            (ALICE, "what-is-base"),
            (BOB, "smart-contracts-on-base"),
            (CAROL, "base-wallet-setup"),
        ] {
            let request = json!({ "userAddress": user, "tutorialId": tutorial, "quizScore": 50 });
            call(&app, Method::POST, "/api/achievements", Some(request)).await;
        }

        let (status, body) = call(&app, Method::GET, "/api/leaderboard?limit=10", None).await;
        assert_eq!(status, StatusCode::OK);
        let order: Vec<&str> = body["data"]["entries"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["userAddress"].as_str())
            .collect();
        assert_eq!(order, vec![BOB, ALICE, CAROL]);
        assert_eq!(body["data"]["totalUsers"], 3);

        let (status, _) = call(&app, Method::GET, "/api/leaderboard?limit=500", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_turn_and_history() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "swap 0.5 eth to usdc", "userAddress": ALICE })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["intent"], "swap");
        assert_eq!(body["data"]["needsAction"], true);
        assert_eq!(body["data"]["actionData"]["quote"]["amountOut"], "1250");

        let id = body["data"]["conversationId"].as_str().unwrap().to_string();
        let uri = format!("/api/chat/{}", id);
        let (status, history) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["data"]["messages"].as_array().unwrap().len(), 2);

        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_accepts_origin_list() {
        let mut config = config::test_config();
        config.cors_allowed_origins = "https://warpcast.com, https://apex.example".to_string();
        let _ = cors_from_config(&config);
        config.cors_allowed_origins = "*".to_string();
        let _ = cors_from_config(&config);
    }
}
