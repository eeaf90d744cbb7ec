use gsbridge_link::{Bridge, BridgeConfig, LinkConfig};
use gsbridge_transport::{open_serial, SerialConfig, UnixDomainSocket};

use crate::cmd::RunArgs;
use crate::exit::{io_error, link_error, transport_error, CliResult, SUCCESS};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(serve(args))
}

fn bridge_config(args: &RunArgs) -> BridgeConfig {
    BridgeConfig {
        tx_encoding: args.tx_encoding.into(),
        link: LinkConfig {
            enabled: !args.no_link,
            remote_addr: args.remote.clone(),
            ..LinkConfig::default()
        },
        ..BridgeConfig::default()
    }
}

async fn serve(args: RunArgs) -> CliResult<i32> {
    let config = bridge_config(&args);

    let serial = open_serial(&args.device, &SerialConfig::default())
        .map_err(|err| transport_error("serial open failed", err))?;
    let listener = UnixDomainSocket::bind(&args.socket)
        .map_err(|err| transport_error("bind failed", err))?;

    tracing::info!(
        device = %args.device,
        socket = ?args.socket,
        tx_encoding = ?config.tx_encoding,
        link = config.link.enabled,
        "starting bridge"
    );

    Bridge::new(serial, listener, config)
        .run()
        .await
        .map_err(|err| link_error("bridge failed", err))?;

    Ok(SUCCESS)
}
