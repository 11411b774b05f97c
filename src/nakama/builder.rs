use crate::core::config::ClientConfig;
use crate::core::errors::NakamaError;
use crate::core::kernel::{ReqwestRest, RestClientConfig};
use crate::nakama::client::Client;

/// Create a client talking to the server described by `config`
pub fn build_client(config: ClientConfig) -> Result<Client<ReqwestRest>, NakamaError> {
    if config.host.is_empty() {
        return Err(NakamaError::InvalidArgument(
            "host must not be empty".to_string(),
        ));
    }

    let rest_config = RestClientConfig::new(config.http_base_url(), config.server_key.clone())
        .with_timeout_ms(config.timeout_ms);
    let rest = ReqwestRest::new(rest_config)?;

    Ok(Client::new(rest, config))
}

/// Create a client from `NAKAMA_*` environment variables
pub fn build_client_from_env() -> Result<Client<ReqwestRest>, NakamaError> {
    build_client(ClientConfig::from_env("NAKAMA")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_keeps_config() {
        let config = ClientConfig::new("secret".to_string())
            .host("game.example.com")
            .use_ssl(true)
            .auto_refresh_session(false);
        let client = build_client(config).unwrap();
        assert_eq!(client.config().http_base_url(), "https://game.example.com:7350");
        assert!(!client.config().auto_refresh_session);
    }

    #[test]
    fn test_build_client_rejects_empty_host() {
        let config = ClientConfig::default().host("");
        assert!(matches!(
            build_client(config),
            Err(NakamaError::InvalidArgument(_))
        ));
    }
}
