use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use whisper_relay::{
    Config, ConfigOverrides, OutboundRequest,
    request::{Headers, parse_key_value},
    runtime::RealRuntime,
};

/// whisper-relay - OpenAI API relay
///
/// Forwards a GET or POST to the upstream API, adding the configured
/// credentials and retrying once on HTTP 429 or 500.
///
/// Credentials are read from WHISPER_API_TOKEN and WHISPER_ORGANIZATION_ID
/// unless given as flags.
///
/// Examples:
///   whisper-relay get /v1/models
///   whisper-relay post /v1/chat/completions --body '{"model": "gpt-4o"}'
#[derive(Parser, Debug)]
#[command(author, version = env!("WHISPER_RELAY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Upstream API root (defaults to https://api.openai.com/)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    api_url: Option<String>,

    /// API token sent as a bearer token (overrides WHISPER_API_TOKEN)
    #[arg(long = "api-token", value_name = "TOKEN", global = true)]
    api_token: Option<String>,

    /// Organization sent as OpenAI-Organization (overrides WHISPER_ORGANIZATION_ID)
    #[arg(long = "organization-id", value_name = "ORG", global = true)]
    organization_id: Option<String>,

    /// HTTP client timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Forward a GET request
    Get(RequestArgs),

    /// Forward a POST request
    Post(PostArgs),

    /// Forward a request given as JSON: {"method", "path", "params", "headers", "body"}
    Call(CallArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Path relative to the API root, or an absolute URL
    #[arg(value_name = "PATH")]
    path: String,

    /// Query parameter, repeatable
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    headers: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct PostArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// JSON request body
    #[arg(long, value_name = "JSON")]
    body: Option<String>,
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// The request as JSON
    #[arg(value_name = "REQUEST_JSON")]
    request: String,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    parse_key_value(s).map_err(|e| e.to_string())
}

impl RequestArgs {
    fn into_request(self) -> OutboundRequest {
        let headers = if self.headers.is_empty() {
            None
        } else {
            Some(self.headers.into_iter().collect::<Headers>())
        };
        OutboundRequest {
            path: self.path,
            params: self.params,
            headers,
            ..Default::default()
        }
    }
}

/// Crate internals stay at `warn`; application notices (startup, retries,
/// upstream failures) are shown at `info`.
const DEFAULT_LOG_FILTER: &str = "warn,whisper_relay::app=info";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();
    let cli = Cli::parse();

    let config = Config::load(
        &RealRuntime,
        ConfigOverrides {
            api_token: cli.api_token,
            organization_id: cli.organization_id,
            api_url: cli.api_url,
            timeout_secs: cli.timeout,
        },
    );
    let dispatcher = config.build_dispatcher()?;
    dispatcher.started();

    let result = match cli.command {
        Commands::Get(args) => dispatcher.get(args.into_request()).await,
        Commands::Post(args) => {
            let mut request = args.request.into_request();
            request.body = args
                .body
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()
                .context("Invalid JSON in --body")?;
            dispatcher.post(request).await
        }
        Commands::Call(args) => {
            let request: OutboundRequest =
                serde_json::from_str(&args.request).context("Invalid request JSON")?;
            dispatcher.dispatch(request).await
        }
    };

    let payload = result?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_get_parsing() {
        let cli = Cli::try_parse_from([
            "whisper-relay",
            "get",
            "/v1/models",
            "-p",
            "limit=5",
            "-H",
            "Accept=application/json",
        ])
        .unwrap();
        match cli.command {
            Commands::Get(args) => {
                let request = args.into_request();
                assert_eq!(request.path, "/v1/models");
                assert_eq!(request.params, vec![("limit".to_string(), "5".to_string())]);
                assert_eq!(
                    request.headers.unwrap().get("Accept").unwrap(),
                    "application/json"
                );
            }
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_cli_get_without_headers_leaves_them_absent() {
        let cli = Cli::try_parse_from(["whisper-relay", "get", "/v1/models"]).unwrap();
        match cli.command {
            Commands::Get(args) => assert!(args.into_request().headers.is_none()),
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_cli_post_parsing() {
        let cli = Cli::try_parse_from([
            "whisper-relay",
            "post",
            "/v1/chat/completions",
            "--body",
            r#"{"model": "gpt-4o"}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Post(args) => {
                assert_eq!(args.request.path, "/v1/chat/completions");
                assert_eq!(args.body.as_deref(), Some(r#"{"model": "gpt-4o"}"#));
            }
            _ => panic!("Expected Post command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "whisper-relay",
            "--api-url",
            "http://localhost:9000",
            "get",
            "/v1/models",
            "--api-token",
            "sk-abc",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cli.api_token.as_deref(), Some("sk-abc"));
        assert_eq!(cli.timeout, Some(30));
    }

    #[test]
    fn test_cli_rejects_bad_pair() {
        let result = Cli::try_parse_from(["whisper-relay", "get", "/v1/models", "-p", "limit"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["whisper-relay", "/v1/models"]);
        assert!(result.is_err());
    }
}
