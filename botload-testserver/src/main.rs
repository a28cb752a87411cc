use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut behavior = botload_testserver::Behavior::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--latency-ms" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--latency-ms requires a number"))?;
                behavior.latency = Duration::from_millis(ms.parse()?);
            }
            "--fail-every" => {
                let n = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--fail-every requires a number"))?;
                behavior.fail_every = Some(n.parse()?);
            }
            "-h" | "--help" => {
                eprintln!(
                    "botload-testserver\n\nUSAGE:\n  botload-testserver [--bind 127.0.0.1:0] [--latency-ms N] [--fail-every N]\n\nOUTPUT:\n  Prints HTTP_URL=<url> and BOT_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = botload_testserver::TestServerStats::default();
    let app = botload_testserver::router(stats, behavior);

    println!("HTTP_URL=http://{addr}");
    println!("BOT_URL=http://{addr}{}", botload_testserver::PATH_BOT);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
