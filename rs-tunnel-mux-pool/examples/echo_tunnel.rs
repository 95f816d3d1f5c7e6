//! Relays local TCP sessions to a target through two multiplexers joined by one link.
//!
//! Without `--target` a local echo server is started and used as the target.

use anyhow::Context;
use clap::Parser;
use rs_tunnel_mux_pool::{Builder, Config as PoolConfig, Connection, ConnectionPool, tunnel::LinkPool};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::compat::TokioAsyncReadCompatExt;

#[derive(Parser, Clone)]
pub struct Config {
	/// Accept client sessions on this address.
	#[arg(long, short = 'l', default_value = "127.0.0.1:9000")]
	pub listen: String,

	/// Where the far side of the tunnel connects each session to.
	#[arg(long, short = 't')]
	pub target: Option<String>,

	/// Capacity of the queue shared by all streams of one multiplexer.
	#[arg(long, default_value_t = 24)]
	pub send_queue_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let filter = tracing_subscriber::EnvFilter::builder()
		.with_default_directive(tracing::Level::INFO.into())
		.from_env_lossy();

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_file(true)
		.with_line_number(true)
		.with_target(true)
		.init();

	let config = Config::parse();

	let target = match config.target {
		Some(target) => target,
		None => spawn_echo_server().await?,
	};

	let (near, far) = tokio::io::duplex(64 * 1024);
	let (mut client_tunnel, client_link) = LinkPool::new(near.compat(), config.send_queue_size);
	let (mut server_tunnel, server_link) = LinkPool::new(far.compat(), config.send_queue_size);
	tokio::spawn(client_link.run());
	tokio::spawn(server_link.run());

	let pool_config = PoolConfig::new().with_send_queue_size(config.send_queue_size);
	let client = Arc::new(
		Builder::new()
			.with_config(pool_config.clone())
			.build(&mut client_tunnel)?,
	);
	let server = Arc::new(Builder::new().with_config(pool_config).build(&mut server_tunnel)?);

	let listener = TcpListener::bind(&config.listen)
		.await
		.with_context(|| format!("failed to listen on {}", config.listen))?;
	tracing::info!(listen = %config.listen, %target, "Relaying sessions through the tunnel");

	loop {
		tokio::select! {
			accepted = listener.accept() => {
				let (socket, peer) = accepted.context("accept failed")?;
				tracing::info!(%peer, "Client session accepted");
				tokio::spawn(relay_session(client.clone(), server.clone(), socket, target.clone()));
			},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Ctrl+C received, shutting down");
				break;
			}
		}
	}

	client.shutdown().await;
	server.shutdown().await;

	Ok(())
}

async fn relay_session(client: Arc<ConnectionPool>, server: Arc<ConnectionPool>, mut socket: TcpStream, target: String) {
	let inbound = client.new_inbound_connection();

	// This process is both ends of the tunnel, so it dials the target for the far side directly.
	let outbound = match server.new_outbound_connection(inbound.id(), &target).await {
		Ok(outbound) => outbound,
		Err(error) => {
			tracing::error!(stream_id = %inbound.id(), %error, "Failed to reach target");
			client.remove_connection(&*inbound);
			return;
		}
	};
	server.add_connection(outbound.clone());

	if let Some(mut io) = inbound.take_io() {
		match tokio::io::copy_bidirectional(&mut socket, &mut io).await {
			Ok((sent, received)) => tracing::info!(stream_id = %inbound.id(), sent, received, "Session finished"),
			Err(error) => tracing::warn!(stream_id = %inbound.id(), ?error, "Session failed"),
		}
	}

	client.remove_connection(&*inbound);
	server.remove_connection(&*outbound);
}

async fn spawn_echo_server() -> anyhow::Result<String> {
	let listener = TcpListener::bind("127.0.0.1:0").await.context("failed to bind echo server")?;
	let address = listener.local_addr()?.to_string();

	tokio::spawn(async move {
		while let Ok((mut socket, _)) = listener.accept().await {
			tokio::spawn(async move {
				let (mut reader, mut writer) = socket.split();
				let _ = tokio::io::copy(&mut reader, &mut writer).await;
			});
		}
	});

	tracing::info!(%address, "Echo server started");
	Ok(address)
}
