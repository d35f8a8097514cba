use anyhow::Result;
use woodlink_core::config::Config;

pub fn run(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(p) = port {
        config.port = p;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        tokio::select! {
            res = woodlink_server::serve(config) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
