use aurora::{Client, ClientOptions, Event};
use aurora_log::AuroraLogger;
use log::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    AuroraLogger::init(Level::Info)?;

    let options = ClientOptions::default();
    let (client, handle) = aurora::connect(options).await?;

    register_handlers(&client).await?;

    handle.await??;
    Ok(())
}

async fn register_handlers(client: &Client) -> aurora::Result<()> {
    client
        .on("spawn", {
            move |_event: &Event| {
                info!("spawned into the world");
            }
        })
        .await?;

    client
        .on("text", move |event: &Event| {
            if let Event::Text { source, message } = event {
                info!("<{source}> {message}");
            }
        })
        .await?;

    client
        .on("kick", move |event: &Event| {
            if let Event::Kick(reason) = event {
                info!("kicked: {reason}");
            }
        })
        .await?;

    Ok(())
}
