use std::net::SocketAddr;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "-h" | "--help" => {
                eprintln!(
                    "llmbench-testserver\n\nUSAGE:\n  llmbench-testserver [--bind 127.0.0.1:0]\n\nOUTPUT:\n  Prints CHAT_URL=<url> to stdout once ready.\n\nQUERY PARAMETERS (on the chat URL):\n  chunks, delay_ms, usage, done, split, stall, big, status"
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

    let stats = llmbench_testserver::TestServerStats::default();
    let app = llmbench_testserver::router(stats);

    println!(
        "CHAT_URL=http://{addr}{}",
        llmbench_testserver::PATH_CHAT_COMPLETIONS
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
