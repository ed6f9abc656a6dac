//! Interactive SSH shell exposed as a [`Channel`].
//!
//! A background task owns the russh channel. It appends every inbound
//! chunk to a shared buffer and drains a queue of outbound writes, so the
//! synchronous [`Channel`] calls never block on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use log::{debug, trace, warn};
use russh::ChannelMsg;
use russh::client::Msg;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::SshConfig;
use super::ssh::SshTransport;
use crate::channel::Channel;
use crate::error::{ChannelError, Result};

enum Outbound {
    Data(Vec<u8>),
    Close,
}

/// Shell channel on an authenticated SSH connection.
pub struct SshChannel {
    inbound: Arc<Mutex<BytesMut>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl SshChannel {
    /// Connect, authenticate and start an interactive shell.
    pub async fn open(config: SshConfig) -> Result<Self> {
        let transport = SshTransport::connect(config).await?;
        let channel = transport.open_channel().await?;
        debug!("shell opened on {}", transport.config().socket_addr());

        let inbound = Arc::new(Mutex::new(BytesMut::with_capacity(64 * 1024)));
        let closed = Arc::new(AtomicBool::new(false));
        let (outbound, queue) = mpsc::unbounded_channel();

        let pump = tokio::spawn(pump(
            channel,
            transport,
            inbound.clone(),
            queue,
            closed.clone(),
        ));

        Ok(Self {
            inbound,
            outbound,
            closed,
            pump,
        })
    }
}

async fn pump(
    mut channel: russh::Channel<Msg>,
    transport: SshTransport,
    inbound: Arc<Mutex<BytesMut>>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    trace!("received {} bytes", data.len());
                    inbound
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("remote shell exited with status {}", exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    debug!("remote closed the shell");
                    break;
                }
                Some(_) => {}
            },
            cmd = queue.recv() => match cmd {
                Some(Outbound::Data(bytes)) => {
                    if let Err(e) = channel.data(&bytes[..]).await {
                        warn!("write to the shell failed: {}", e);
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = channel.eof().await;
                    let _ = channel.close().await;
                    break;
                }
            },
        }
    }

    closed.store(true, Ordering::SeqCst);
    if let Err(e) = transport.close().await {
        debug!("disconnect failed: {}", e);
    }
}

impl Channel for SshChannel {
    fn read(&mut self) -> Vec<u8> {
        let mut buffer = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.split().to_vec()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(ChannelError::SessionDown {
                context: "writing to the SSH shell".into(),
            }
            .into());
        }
        self.outbound
            .send(Outbound::Data(data.to_vec()))
            .map_err(|_| {
                ChannelError::SessionDown {
                    context: "writing to the SSH shell".into(),
                }
                .into()
            })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.pump.is_finished()
    }

    fn clear_buffer(&mut self) {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        self.close();
    }
}
