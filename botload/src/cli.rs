use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|err| format!("invalid duration '{input}' (expected e.g. 10s, 250ms, 1m): {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Live spinner and a human-readable summary.
    HumanReadable,
    /// NDJSON progress lines and a final summary line on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "botload",
    author,
    version,
    about = "Load testing for chat-bot message APIs",
    long_about = "botload sends concurrent sendMessage-style requests to a chat-bot HTTP API and reports latency, throughput and failures.\n\nRun it as a service (`botload serve`) and drive tests over its REST API, or fire a single test from the command line (`botload run`).\n\nSettings are layered: built-in defaults, then the YAML file given with --config, then environment variables, then flags.",
    after_help = "Examples:\n  botload serve --bot-url http://127.0.0.1:8081/bot123\n  botload run --chat-id 42 --message hello --bot-url http://127.0.0.1:8081/bot123\n  botload run --chat-id 42 --message hello --threads 50 --requests 20 --delay 0ms --output json"
)]
pub struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "BOTLOAD_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter (tracing directives, e.g. `info` or `botload_core=debug`); RUST_LOG wins
    #[arg(long, global = true, env = "BOTLOAD_LOG", value_name = "FILTER")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the load-test REST API
    #[command(
        long_about = "Start the REST API under /api/load-test.\n\nTests started through the API run in the background; poll GET /api/load-test/{id} for live and final results."
    )]
    Serve(ServeArgs),

    /// Run a single load test and print its report
    Run(RunArgs),
}

/// Settings shared by `serve` and `run`.
#[derive(Debug, Default, Args)]
pub struct TargetArgs {
    /// Base URL of the bot API (the API method is appended)
    #[arg(long, env = "BOTLOAD_BOT_URL", value_name = "URL")]
    pub bot_url: Option<String>,

    /// TCP connect timeout (e.g. 10s)
    #[arg(long, env = "BOTLOAD_CONNECT_TIMEOUT", value_parser = parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Per-request timeout covering send and response read (e.g. 30s)
    #[arg(long, env = "BOTLOAD_READ_TIMEOUT", value_parser = parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Ceiling on one run's wall-clock time (e.g. 30m)
    #[arg(long, env = "BOTLOAD_MAX_EXECUTION_TIME", value_parser = parse_duration)]
    pub max_execution_time: Option<Duration>,

    /// Time stopped workers get to report before being aborted (e.g. 1s)
    #[arg(long, env = "BOTLOAD_STOP_GRACE_PERIOD", value_parser = parse_duration)]
    pub stop_grace_period: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address the API listens on
    #[arg(long, env = "BOTLOAD_BIND", value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Thread count for requests that omit `threadCount`
    #[arg(long, env = "BOTLOAD_DEFAULT_THREADS")]
    pub default_threads: Option<u32>,

    /// Largest `threadCount` a request may ask for
    #[arg(long, env = "BOTLOAD_MAX_THREADS")]
    pub max_threads: Option<u32>,

    /// Requests per thread for requests that omit `requestsPerThread`
    #[arg(long, env = "BOTLOAD_DEFAULT_REQUESTS")]
    pub default_requests: Option<u32>,

    /// Delay for requests that omit `delayBetweenRequests` (e.g. 100ms)
    #[arg(long, env = "BOTLOAD_DEFAULT_DELAY", value_parser = parse_duration)]
    pub default_delay: Option<Duration>,

    /// API method for requests that omit `apiMethod`
    #[arg(long, env = "BOTLOAD_API_METHOD")]
    pub api_method: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Chat id every message is sent to
    #[arg(long)]
    pub chat_id: String,

    /// Message text; each request appends ` #<n>`
    #[arg(long)]
    pub message: String,

    /// Number of concurrent workers
    #[arg(long)]
    pub threads: Option<u32>,

    /// Requests sent by each worker
    #[arg(long)]
    pub requests: Option<u32>,

    /// Pause between two requests of one worker (e.g. 100ms, 0ms)
    #[arg(long, value_parser = parse_duration)]
    pub delay: Option<Duration>,

    /// API method appended to the bot url
    #[arg(long, env = "BOTLOAD_API_METHOD")]
    pub api_method: Option<String>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("0ms"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
        assert_eq!(parse_duration("1s 500ms"), Ok(Duration::from_millis(1_500)));
        assert_eq!(parse_duration("1m 30s"), Ok(Duration::from_secs(90)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5ms").is_err());
    }

    #[test]
    fn cli_parses_run() {
        let parsed = Cli::try_parse_from([
            "botload",
            "run",
            "--chat-id",
            "42",
            "--message",
            "hello",
            "--threads",
            "2",
            "--requests",
            "5",
            "--delay",
            "250ms",
            "--bot-url",
            "http://127.0.0.1:8081/bot1",
            "--read-timeout",
            "5s",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.chat_id, "42");
                assert_eq!(args.message, "hello");
                assert_eq!(args.threads, Some(2));
                assert_eq!(args.requests, Some(5));
                assert_eq!(args.delay, Some(Duration::from_millis(250)));
                assert_eq!(
                    args.target.bot_url.as_deref(),
                    Some("http://127.0.0.1:8081/bot1")
                );
                assert_eq!(args.target.read_timeout, Some(Duration::from_secs(5)));
                assert_eq!(args.output, OutputFormat::Json);
            }
            Command::Serve(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_serve_with_global_config() {
        let parsed = Cli::try_parse_from([
            "botload",
            "serve",
            "--bind",
            "127.0.0.1:9090",
            "--config",
            "botload.yaml",
            "--default-threads",
            "4",
            "--max-threads",
            "64",
        ]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.config, Some(PathBuf::from("botload.yaml")));
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.bind, "127.0.0.1:9090".parse().ok());
                assert_eq!(args.default_threads, Some(4));
                assert_eq!(args.max_threads, Some(64));
                assert_eq!(args.default_delay, None);
            }
            Command::Run(_) => panic!("expected serve command"),
        }
    }

    #[test]
    fn run_requires_chat_id_and_message() {
        assert!(Cli::try_parse_from(["botload", "run", "--message", "hi"]).is_err());
        assert!(Cli::try_parse_from(["botload", "run", "--chat-id", "1"]).is_err());
    }
}
