use std::sync::Arc;

use anyhow::Result;

use crate::core::config::AppConfig;
use crate::core::llm::RegistryProviderFactory;
use crate::core::llm::registry::ProviderRegistry;
use crate::core::terminal::{self, print_info, print_link, print_status, print_warn};
use crate::interfaces::web::{self, AppState};
use crate::logging;

use super::{parse_api_server_flags, parse_config_flag};

pub async fn run(args: &[String]) -> Result<()> {
    let mut config = AppConfig::load(parse_config_flag(args, 2).as_deref())?;
    let (host, port) =
        parse_api_server_flags(args, 2, config.server.host.clone(), config.server.port);
    config.server.host = host;
    config.server.port = port;

    let log_tx = logging::init(&config.logging.level, false);

    let registry = ProviderRegistry::load_with_overrides(config.llm.providers_file.as_deref())?;
    let factory = RegistryProviderFactory::new(
        registry,
        &config.llm.provider,
        config.llm.timeout_secs,
    );
    let has_server_key = config.server_api_key().is_some();
    let state = AppState::new(Arc::new(factory), config, log_tx)?;

    terminal::print_banner();
    print_status("Provider", &state.config.llm.provider);
    print_status("Model", &state.model);
    let base = format!(
        "http://{}:{}",
        state.config.server.host, state.config.server.port
    );
    print_link("API", &format!("{}/api", base));
    print_link("Logs", &format!("{}/api/logs", base));
    if !has_server_key {
        print_warn(&format!(
            "No server API key set ({} or llm.api_key); requests must send apiKey.",
            state.config.llm.api_key_env
        ));
    }
    print_info("Press Ctrl+C to stop.");

    web::serve(state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
