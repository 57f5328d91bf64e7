use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::visualizer::Visualization;

/// Control messages the GUI process may send back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GuiCommand {
    /// (Re)open the devices and start the producer.
    Connect,
    /// Stop the producer and release the devices.
    Disconnect,
    Filter { enabled: bool },
    Visualization { enabled: bool },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PlotMessage<'a> {
    Waveform {
        samples: &'a [i32],
    },
    Spectrum {
        frequencies: &'a [f64],
        magnitudes: &'a [f64],
    },
}

pub struct GuiBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    tx: mpsc::Sender<GuiCommand>,
}

// GUI进程和Core进程通过本地UDP通信，端口在配置中指定
impl GuiBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<GuiCommand>) -> anyhow::Result<Self> {
        Self::bind(config.gui_local_port, config.gui_remote_port, tx).await
    }

    pub async fn bind(
        local_port: u16,
        remote_port: u16,
        tx: mpsc::Sender<GuiCommand>,
    ) -> anyhow::Result<Self> {
        // 绑定本地UDP端口
        let socket = UdpSocket::bind(format!("127.0.0.1:{}", local_port)).await?;
        let target_addr = format!("127.0.0.1:{}", remote_port);

        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            tx,
        })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = [0u8; 4096]; // 4KB缓冲区
        loop {
            // 通过UDP socket接收消息
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue;
            }
            match serde_json::from_slice::<GuiCommand>(&buf[..len]) {
                Ok(cmd) => {
                    if let Err(e) = self.tx.send(cmd).await {
                        log::error!("Failed to forward GUI command: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Ignoring GUI message: {}", e),
            }
        }
        Ok(())
    }

    async fn send_plot(&self, msg: &PlotMessage<'_>) {
        let payload = match serde_json::to_vec(msg) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to encode plot message: {}", e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&payload, &self.target_addr).await {
            log::debug!("Failed to send to GUI: {}", e);
        }
    }
}

#[async_trait]
impl Visualization for GuiBridge {
    async fn set_waveform(&self, samples: &[i32]) {
        self.send_plot(&PlotMessage::Waveform { samples }).await;
    }

    async fn set_spectrum(&self, frequencies: &[f64], magnitudes: &[f64]) {
        self.send_plot(&PlotMessage::Spectrum {
            frequencies,
            magnitudes,
        })
        .await;
    }
}
