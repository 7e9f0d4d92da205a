use engine::api::{build_router, AppState};
use engine::search::{HttpSearchClient, SearchClient, UnconfiguredSearchClient};
use engine::EngineConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Arc::new(EngineConfig::load());
    let chat_model = Arc::new(llm::OpenRouterClient::new(llm::RemoteLlmConfig::new(
        config.lm_api_key.clone().unwrap_or_default(),
        config.lm_base_url.clone(),
    )));
    let search_client: Arc<dyn SearchClient> = match &config.search_endpoint {
        Some(endpoint) => Arc::new(HttpSearchClient::new(endpoint.clone(), config.search_api_key.clone())),
        None => Arc::new(UnconfiguredSearchClient),
    };

    let listen_addr = config.listen_addr.clone();
    let state = AppState { config, chat_model, search_client };
    let router = build_router(state);

    tracing::info!(addr = %listen_addr, "starting engine server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.expect("failed to bind listen address");
    axum::serve(listener, router).await.expect("server error");
}
