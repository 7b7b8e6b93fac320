use std::sync::Arc;
use std::time::Duration;

use simo_config::SimoConfig;
use simo_core::CommandChannel;
use simo_device::{LinkOptions, RecordingChannel, TcpLink};
use simo_runtime::{DriverOptions, Pipeline};
use tokio::io::{BufReader, stdin, stdout};
use tracing::{info, warn};

pub(super) async fn cmd_run(config: SimoConfig, dry_run: bool) -> simo_core::Result<()> {
    for w in config.validate().map_err(simo_core::SimoError::Config)? {
        warn!("{w}");
    }

    let link = if dry_run {
        None
    } else {
        LinkOptions::from_config(&config.device, &config.safety)?
            .map(|options| Arc::new(TcpLink::spawn(options)))
    };

    let channel: Arc<dyn CommandChannel> = match &link {
        Some(link) => {
            info!(address = link.address(), "driving controller");
            Arc::clone(link) as Arc<dyn CommandChannel>
        }
        None => {
            println!("🧪 Dry run: commands are recorded, nothing moves");
            Arc::new(RecordingChannel::new())
        }
    };

    let options = DriverOptions::from_config(&config);
    let pipeline = Pipeline::builder(config).with_channel(channel).build()?;

    println!("🤖 Simo ready. Type an instruction, `status`, or `quit`.");
    simo_runtime::run(&pipeline, BufReader::new(stdin()), stdout(), options).await?;

    if let Some(link) = link {
        // let the final STOP reach the socket before the writer goes away
        tokio::time::sleep(Duration::from_millis(100)).await;
        link.shutdown();
    }
    println!("👋 Stopped.");
    Ok(())
}
