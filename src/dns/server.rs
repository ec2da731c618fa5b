use crate::config::SharedConfig;
use crate::dns::handlers::{Handler, TxtRecordCell};
use crate::interaction::OnResult;
use crate::stats::ServerStats;
use crate::storage::DynStorage;
use crate::txt_store::DynTxtStore;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

/// Bind the UDP and TCP listeners and wire the responder into a
/// [`ServerFuture`]. Bind failures are fatal to the DNS subsystem and
/// surface to the supervisor as an error.
pub async fn new(
    config: SharedConfig,
    storage: DynStorage,
    acme_store: DynTxtStore,
    acme_txt: TxtRecordCell,
    stats: Arc<ServerStats>,
    on_result: Option<OnResult>,
) -> anyhow::Result<ServerFuture<Handler>> {
    let udp_addr = config.dns_udp_bind_addr;
    let tcp_addr = config.dns_tcp_bind_addr;
    let tcp_timeout = config.dns_tcp_timeout;
    let dns_handler = Handler::new(config, storage, acme_store, acme_txt, stats, on_result)?;
    let mut dns_server = ServerFuture::new(dns_handler);
    dns_server.register_socket(UdpSocket::bind(udp_addr).await?);
    dns_server.register_listener(TcpListener::bind(tcp_addr).await?, tcp_timeout);
    Ok(dns_server)
}
